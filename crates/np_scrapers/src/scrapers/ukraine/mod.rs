use std::sync::Arc;

use crate::scrapers::NewsSource;

pub mod epravda;
pub mod politeka;
pub mod pravda;

pub use epravda::EpravdaSource;
pub use politeka::PolitekaSource;
pub use pravda::PravdaSource;

/// Returns every supported Ukrainian news source
pub fn get_sources() -> Vec<Arc<dyn NewsSource>> {
    vec![
        Arc::new(EpravdaSource::new()),
        Arc::new(PravdaSource::new()),
        Arc::new(PolitekaSource::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_sources() {
        let sources = get_sources();
        assert_eq!(sources.len(), 3);

        let names: Vec<_> = sources.iter().flat_map(|s| s.cli_names()).collect();
        assert!(names.contains(&"epravda"));
        assert!(names.contains(&"pravda"));
        assert!(names.contains(&"politeka"));
    }
}
