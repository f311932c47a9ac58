//! Analysis and computation configuration

/// Settings for the B×B occupancy grid shared by bin box, Gilar-Watson and the modeling approach
pub struct BinBoxSettings {
    // Number of bins along each axis when the caller does not choose one
    pub default_bin_number: usize,
    // Expected fraction of occupied bins under random peak placement
    pub random_coverage: f64,
}

/// Settings for the %BIN spreading metric
pub struct PercentBinSettings {
    // Fixed grid resolution (bins per axis)
    pub grid_size: usize,
    // Returned when best-case and worst-case SAD coincide (nb_peaks <= 1)
    pub degenerate_value: f64,
}

/// Settings for %FIT (quadratic fit residual spread)
pub struct PercentFitSettings {
    // Number of evenly spaced curve samples for the coarse nearest-point search
    pub coarse_points: usize,
    // Half-width of the bounded refinement window around the coarse minimum
    pub fine_range: f64,
    // Absolute x tolerance of the bounded refinement
    pub x_tolerance: f64,
    pub max_iterations: usize,
    // 1 - |1 - k * stat| scaling factors
    pub mean_scale: f64,
    pub sd_scale: f64,
}

/// Settings for nearest-neighbour distance means
pub struct NndSettings {
    // Divisor of the (sqrt(nb_peaks) - 1) normalisation
    pub normalisation_divisor: f64,
}

/// Settings for redundancy grouping
pub struct CorrelationSettings {
    pub default_threshold: f64,
    pub default_tolerance: f64,
}

/// Settings for missing retention time handling
pub struct NanPolicySettings {
    // Peaks whose missing percentage is strictly above this are dropped
    pub default_threshold_pct: f64,
}

/// Settings for pair enumeration
pub struct CombinationSettings {
    // Columns below this index are tagged as the first chromatographic mode
    pub first_mode_columns: usize,
    pub first_mode_label: &'static str,
    pub second_mode_label: &'static str,
}

/// Relative cost of each metric, used for progress reporting
pub struct ProgressSettings {
    pub default_weight: u32,
    pub percent_fit_weight: u32,
}

/// The Master Analysis Configuration
pub struct AnalysisConfig {
    pub bin_box: BinBoxSettings,
    pub percent_bin: PercentBinSettings,
    pub percent_fit: PercentFitSettings,
    pub nnd: NndSettings,
    pub correlation: CorrelationSettings,
    pub nan_policy: NanPolicySettings,
    pub combination: CombinationSettings,
    pub progress: ProgressSettings,
}

pub const ANALYSIS: AnalysisConfig = AnalysisConfig {
    bin_box: BinBoxSettings {
        default_bin_number: 14,
        random_coverage: 0.63,
    },

    percent_bin: PercentBinSettings {
        grid_size: 5,
        degenerate_value: 1.0,
    },

    percent_fit: PercentFitSettings {
        coarse_points: 50,
        fine_range: 0.01,
        x_tolerance: 1e-5,
        max_iterations: 500,
        mean_scale: 4.0,
        sd_scale: 7.0,
    },

    nnd: NndSettings {
        normalisation_divisor: 0.64,
    },

    correlation: CorrelationSettings {
        default_threshold: 0.85,
        default_tolerance: 0.0,
    },

    nan_policy: NanPolicySettings {
        default_threshold_pct: 50.0,
    },

    combination: CombinationSettings {
        first_mode_columns: 8,
        first_mode_label: "HILIC",
        second_mode_label: "RPLC",
    },

    progress: ProgressSettings {
        default_weight: 1,
        percent_fit_weight: 10,
    },
};
