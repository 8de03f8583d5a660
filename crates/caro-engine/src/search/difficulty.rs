//! AI difficulty presets, compiled in rather than read from a config file.

/// A named difficulty tier with its search-shaping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AIDifficulty {
    Braindead,
    Easy,
    Normal,
    Medium,
    Hard,
    VeryHard,
    Expert,
    Master,
    Grandmaster,
    Legend,
    BookGeneration,
}

/// Resolved parameters for one [`AIDifficulty`] tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Iterative-deepening depth never exceeds this, even with time left.
    pub max_depth_cap: u8,
    /// Worker threads spawned per `best_move` call.
    pub thread_count: usize,
    /// Multiplies the time manager's soft/hard limits.
    pub time_multiplier: f64,
    /// Whether a Lazy-SMP thread pool is used at all.
    pub parallel_enabled: bool,
    /// Probability of returning a second-best (or later) root move instead
    /// of the true best, to keep weaker tiers beatable.
    pub error_rate: f64,
}

impl AIDifficulty {
    /// All eleven tiers, weakest first.
    pub const ALL: [AIDifficulty; 11] = [
        AIDifficulty::Braindead,
        AIDifficulty::Easy,
        AIDifficulty::Normal,
        AIDifficulty::Medium,
        AIDifficulty::Hard,
        AIDifficulty::VeryHard,
        AIDifficulty::Expert,
        AIDifficulty::Master,
        AIDifficulty::Grandmaster,
        AIDifficulty::Legend,
        AIDifficulty::BookGeneration,
    ];

    /// The profile backing this tier.
    pub fn profile(self) -> DifficultyProfile {
        match self {
            AIDifficulty::Braindead => DifficultyProfile {
                max_depth_cap: 2,
                thread_count: 1,
                time_multiplier: 0.1,
                parallel_enabled: false,
                error_rate: 0.80,
            },
            AIDifficulty::Easy => DifficultyProfile {
                max_depth_cap: 3,
                thread_count: 1,
                time_multiplier: 0.2,
                parallel_enabled: false,
                error_rate: 0.55,
            },
            AIDifficulty::Normal => DifficultyProfile {
                max_depth_cap: 4,
                thread_count: 1,
                time_multiplier: 0.35,
                parallel_enabled: false,
                error_rate: 0.35,
            },
            AIDifficulty::Medium => DifficultyProfile {
                max_depth_cap: 6,
                thread_count: 1,
                time_multiplier: 0.5,
                parallel_enabled: false,
                error_rate: 0.20,
            },
            AIDifficulty::Hard => DifficultyProfile {
                max_depth_cap: 8,
                thread_count: 1,
                time_multiplier: 0.7,
                parallel_enabled: false,
                error_rate: 0.10,
            },
            AIDifficulty::VeryHard => DifficultyProfile {
                max_depth_cap: 10,
                thread_count: 2,
                time_multiplier: 0.85,
                parallel_enabled: true,
                error_rate: 0.05,
            },
            AIDifficulty::Expert => DifficultyProfile {
                max_depth_cap: 12,
                thread_count: 2,
                time_multiplier: 1.0,
                parallel_enabled: true,
                error_rate: 0.02,
            },
            AIDifficulty::Master => DifficultyProfile {
                max_depth_cap: 16,
                thread_count: 4,
                time_multiplier: 1.0,
                parallel_enabled: true,
                error_rate: 0.0,
            },
            AIDifficulty::Grandmaster => DifficultyProfile {
                max_depth_cap: 24,
                thread_count: 4,
                time_multiplier: 1.2,
                parallel_enabled: true,
                error_rate: 0.0,
            },
            AIDifficulty::Legend => DifficultyProfile {
                max_depth_cap: 32,
                thread_count: 8,
                time_multiplier: 1.5,
                parallel_enabled: true,
                error_rate: 0.0,
            },
            AIDifficulty::BookGeneration => DifficultyProfile {
                max_depth_cap: u8::MAX,
                thread_count: 8,
                time_multiplier: 4.0,
                parallel_enabled: true,
                error_rate: 0.0,
            },
        }
    }
}
