//! Matrix rebuild configuration.

/// Conventional name of the canonical matrix table.
pub const DEFAULT_MATRIX: &str = "matriz_astro_luna";

/// Historical names of the raw results table, tried in order.
pub const DEFAULT_SOURCE_CANDIDATES: &[&str] = &["astroluna", "astro_luna"];

/// Configuration for [`MatrixBuilder`](super::MatrixBuilder).
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Name of the canonical matrix table.
    pub matrix: String,
    /// Candidate source table names; the first existing one is used.
    pub source_candidates: Vec<String>,
    /// Proceed even when the source lacks required matrix columns. The
    /// store's NOT NULL constraints may then reject the insert.
    pub allow_nulls: bool,
    /// Compute the rebuild without writing.
    pub dry_run: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            matrix: DEFAULT_MATRIX.to_string(),
            source_candidates: DEFAULT_SOURCE_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allow_nulls: false,
            dry_run: false,
        }
    }
}

impl MatrixConfig {
    /// Set the matrix table name.
    pub fn with_matrix(mut self, matrix: impl Into<String>) -> Self {
        self.matrix = matrix.into();
        self
    }

    /// Replace the source candidates.
    pub fn with_source_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Tolerate missing required columns.
    pub fn allow_nulls(mut self, allow: bool) -> Self {
        self.allow_nulls = allow;
        self
    }

    /// Enable or disable dry-run.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Name of the staging table used by the extended rebuild.
    pub fn staging_table(&self) -> String {
        format!("{}_new", self.matrix)
    }

    /// Name the previous matrix is parked under during the swap.
    pub fn backup_table(&self) -> String {
        format!("{}_backup", self.matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MatrixConfig::default();
        assert_eq!(config.matrix, "matriz_astro_luna");
        assert_eq!(config.source_candidates, vec!["astroluna", "astro_luna"]);
        assert!(!config.allow_nulls);
        assert!(!config.dry_run);
        assert_eq!(config.staging_table(), "matriz_astro_luna_new");
        assert_eq!(config.backup_table(), "matriz_astro_luna_backup");
    }

    #[test]
    fn test_config_builder() {
        let config = MatrixConfig::default()
            .with_matrix("matriz")
            .with_source_candidates(["fuente"])
            .allow_nulls(true)
            .dry_run(true);

        assert_eq!(config.matrix, "matriz");
        assert_eq!(config.source_candidates, vec!["fuente"]);
        assert!(config.allow_nulls);
        assert!(config.dry_run);
    }
}
