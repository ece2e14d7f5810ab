/// Upper bound on records submitted to the store in a single commit.
pub const DEFAULT_COMMIT_BATCH_SIZE: usize = 450;

/// Number of row-level error messages kept in an import summary.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Decimal places kept on computed P&L percentages.
pub const PNL_PERCENT_PRECISION: u32 = 4;
