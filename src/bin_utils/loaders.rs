extern crate ltl_core;
extern crate serde_json;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use self::ltl_core::optimizer::{AlgorithmParameters, Optimizer, Report};
use self::ltl_core::{
    CrossEntropyOptimizer, FaceOptimizer, FitnessWeights, GeneticAlgorithmOptimizer, LtlError,
    Optimizee, ParamSpec, Result,
};

/// Reads and validates optimizer parameters from a JSON file
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<AlgorithmParameters> {
    let path = path.as_ref();
    info!("Loading optimizer parameters from {}", path.display());
    let f = File::open(path).map_err(|e| {
        LtlError::config(format!("cannot open config file {}: {}", path.display(), e))
    })?;
    let params: AlgorithmParameters = serde_json::from_reader(BufReader::new(f))
        .map_err(|e| LtlError::config(format!("cannot parse {}: {}", path.display(), e)))?;
    params.validate()?;
    Ok(params)
}

/// Builds the optimizer described by `params`
pub fn build_optimizer<O: Optimizee + 'static>(
    params: AlgorithmParameters,
    optimizee: O,
    weights: FitnessWeights,
    spec: ParamSpec,
) -> Result<Box<dyn Optimizer>> {
    Ok(match params {
        AlgorithmParameters::CrossEntropy(p) => {
            info!("Using Cross-Entropy optimizer");
            Box::new(CrossEntropyOptimizer::new(optimizee, weights, spec, p)?)
        }
        AlgorithmParameters::Face(p) => {
            info!("Using FACE optimizer");
            Box::new(FaceOptimizer::new(optimizee, weights, spec, p)?)
        }
        AlgorithmParameters::GeneticAlgorithm(p) => {
            info!("Using Genetic Algorithm optimizer");
            Box::new(GeneticAlgorithmOptimizer::new(optimizee, weights, spec, p)?)
        }
    })
}

/// Write out the report as JSON, if a path is given
pub fn write_report(report: &Report, path: Option<&str>) -> Result<()> {
    if let Some(fname) = path {
        info!("Writing report to {}", fname);
        let f = File::create(fname)
            .map_err(|e| LtlError::config(format!("file `{}` failed to open: {}", fname, e)))?;
        serde_json::to_writer_pretty(f, report)
            .map_err(|e| LtlError::config(format!("error writing report: {}", e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate ltl_optimizees;
    extern crate tempfile;

    use std::io::Write;

    use self::ltl_optimizees::{CostFunction, FunctionOptimizee};
    use super::*;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_read_config() {
        let f = config_file(
            r#"{
                "optimizer": "CrossEntropy",
                "pop_size": 10, "rho": 0.9, "smoothing": 0.0, "temp_decay": 0.0,
                "n_iteration": 100,
                "distribution": {"type": "NoisyGaussian", "noise_magnitude": 1.0, "noise_decay": 0.99},
                "seed": 102
            }"#,
        );
        match read_config(f.path()).unwrap() {
            AlgorithmParameters::CrossEntropy(p) => {
                assert_eq!(p.pop_size, 10);
                assert!(p.stop_criterion.is_infinite());
            }
            other => panic!("expected cross-entropy parameters, got {:?}", other),
        }

        let f = config_file(
            r#"{"optimizer": "GeneticAlgorithm", "seed": 42, "popsize": 50, "CXPB": 0.5,
                "MUTPB": 0.2, "NGEN": 20, "indpb": 0.02, "tournsize": 15,
                "matepar": 0.5, "mutpar": 1.0}"#,
        );
        assert!(read_config(f.path()).is_ok());
    }

    #[test]
    fn test_bad_configs() {
        match read_config("/definitely/not/here.json") {
            Err(LtlError::Configuration(msg)) => assert!(msg.contains("here.json")),
            other => panic!("expected a configuration error, got {:?}", other),
        }

        let f = config_file("{ not json");
        assert!(read_config(f.path()).is_err());

        // parses, but fails validation
        let f = config_file(
            r#"{"optimizer": "Face", "min_pop_size": 20, "max_pop_size": 10, "n_elite": 5,
                "smoothing": 0.2, "temp_decay": 0, "n_iteration": 10,
                "distribution": {"type": "Gaussian"}, "n_expand": 5}"#,
        );
        assert!(read_config(f.path()).is_err());
    }

    #[test]
    fn test_build_and_report() {
        let f = config_file(
            r#"{"optimizer": "Face", "min_pop_size": 10, "max_pop_size": 20, "n_elite": 5,
                "smoothing": 0.2, "temp_decay": 0, "n_iteration": 3,
                "distribution": {"type": "Gaussian"}, "n_expand": 2}"#,
        );
        let params = read_config(f.path()).unwrap();
        let optimizee = FunctionOptimizee::new(CostFunction::Sphere, 2, 1).unwrap();
        let sim = optimizee.simulator();
        let spec = optimizee.spec();
        let mut opt = build_optimizer(params, optimizee, FitnessWeights::minimize(), spec).unwrap();
        assert_eq!(opt.batch().len(), 10);

        let report = crate::runner::run_sequential(opt.as_mut(), &sim).unwrap();
        assert_eq!(report.generations, 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&report, path.to_str()).unwrap();
        let written: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(written["optimizer"], "FaceOptimizer");
        assert_eq!(written["generations"], 3);

        write_report(&report, None).unwrap();
    }
}
