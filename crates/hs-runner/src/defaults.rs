//! Built-in search spaces for well-known model families.

use hs_types::{HsError, HsResult, SearchSpace};

/// Model families with a registered default space.
pub const KNOWN_MODELS: &[&str] = &["XGBClassifier", "LogisticRegression", "LinearSgd"];

/// Default search space for `model_name`, or a configuration error when
/// the model has none registered.
pub fn default_search_space(model_name: &str) -> HsResult<SearchSpace> {
    let builder = SearchSpace::builder();
    let builder = match model_name {
        "XGBClassifier" => builder
            .add_values("learning_rate", [0.01, 0.1, 0.3])
            .add_values("max_depth", [3i64, 5, 7]),
        "LogisticRegression" => builder.add_values("C", [0.01, 0.1, 1.0, 10.0]),
        "LinearSgd" => builder
            .add_values("learning_rate", [0.001, 0.01, 0.05, 0.1])
            .add_values("epochs", [50i64, 200, 500])
            .add_values("l2", [0.0, 0.001, 0.01]),
        other => {
            return Err(HsError::Configuration(format!(
                "No default search space for model {other:?}; pass one explicitly \
                 (models with defaults: {})",
                KNOWN_MODELS.join(", ")
            )))
        }
    };
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_types::ParamValue;

    #[test]
    fn every_known_model_has_a_space() {
        for name in KNOWN_MODELS {
            let space = default_search_space(name).unwrap();
            assert!(space.num_parameters() >= 1, "{name}");
        }
    }

    #[test]
    fn xgb_grid() {
        let space = default_search_space("XGBClassifier").unwrap();
        let names: Vec<_> = space.names().collect();
        assert_eq!(names, vec!["learning_rate", "max_depth"]);
        assert_eq!(space.grid_size(), Some(9));
        assert_eq!(
            space.values("max_depth").unwrap(),
            &[ParamValue::Int(3), ParamValue::Int(5), ParamValue::Int(7)][..]
        );
    }

    #[test]
    fn unknown_model() {
        let err = default_search_space("RandomForest").unwrap_err();
        assert!(matches!(err, HsError::Configuration(_)));
        let message = err.to_string();
        for name in KNOWN_MODELS {
            assert!(message.contains(name), "{message}");
        }
    }
}
