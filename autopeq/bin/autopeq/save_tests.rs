#[cfg(test)]
mod tests {
    use crate::save::save_design;
    use autopeq::{Curve, DesignConfig, DesignResult, create_log_frequency_grid, design_peq};
    use autopeq::iir::{Biquad, Filter, SRATE};
    use std::fs;
    use tempfile::TempDir;

    fn bump_design() -> (DesignResult, DesignConfig) {
        let freq = create_log_frequency_grid(300, 20.0, 20000.0).unwrap();
        let spl = Filter::Peak(Biquad::new(1000.0, SRATE, 5.0, 6.0)).response_db(&freq);
        let measured = Curve::new(freq.clone(), spl).unwrap();
        let target = Curve::flat(freq, 0.0).unwrap();
        let config = DesignConfig::default();
        (design_peq(&measured, &target, &config).unwrap(), config)
    }

    #[tokio::test]
    async fn test_save_design_apo_and_json() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("nested").join("speaker");
        let (result, config) = bump_design();

        let (apo, json) = save_design(&result, &config, &output_path).await.unwrap();
        assert!(apo.exists());
        assert!(json.exists());

        let content = fs::read_to_string(&apo).unwrap();
        assert!(content.contains("AutoPEQ"));
        assert!(content.contains("Preamp:"));
        assert!(content.contains("ON PK Fc"));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["config"]["greedy"]["max_stages"], 10);
        let chain = value["result"]["chain"].as_array().unwrap();
        assert_eq!(chain.len(), result.chain.len());
        assert_eq!(chain[0]["type"], "gain");
    }
}
