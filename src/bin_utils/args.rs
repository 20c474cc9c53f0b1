extern crate ltl_core;
extern crate ltl_optimizees;

use std::str::FromStr;

use clap::{App, Arg, ArgMatches, SubCommand};

use self::ltl_core::distribution::DistributionParameters;
use self::ltl_core::optimizer::AlgorithmParameters;
use self::ltl_core::{
    CrossEntropyParameters, FaceParameters, FitnessWeights, GeneticAlgorithmParameters, LtlError,
    Result,
};
use self::ltl_optimizees::CostFunction;

use super::loaders::read_config;

/// Trait to add new arguments to the current app
pub trait ArgAugmenter {
    /// Type of struct to output from this parser
    type Output;

    /// Specifies arguments to add
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b>;

    /// Parses the arguments
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>) -> Self::Output;
}

/// Parses `name` when present, otherwise returns `default`
fn value_or<'a, T: FromStr>(args: &ArgMatches<'a>, name: &str, default: T) -> Result<T> {
    match args.value_of(name) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| LtlError::config(format!("invalid value for --{}: '{}'", name, v))),
    }
}

fn distribution_arg<'a, 'b>(default: &'a str) -> Arg<'a, 'b> {
    Arg::with_name("distribution")
        .long("distribution")
        .takes_value(true)
        .possible_values(&["gaussian", "noisy"])
        .default_value(default)
        .help("Sampling distribution")
}

fn noise_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("noise-magnitude")
            .long("noise-magnitude")
            .takes_value(true)
            .help("Initial noise variance of the noisy distribution.  Defaults to 1.0"),
    )
    .arg(
        Arg::with_name("noise-decay")
            .long("noise-decay")
            .takes_value(true)
            .help("Noise decay per generation.  Defaults to 0.99"),
    )
}

fn load_distribution<'a>(args: &ArgMatches<'a>) -> Result<DistributionParameters> {
    match args.value_of("distribution") {
        Some("noisy") => Ok(DistributionParameters::NoisyGaussian {
            noise_magnitude: value_or(args, "noise-magnitude", 1.0)?,
            noise_decay: value_or(args, "noise-decay", 0.99)?,
        }),
        _ => Ok(DistributionParameters::Gaussian),
    }
}

/// Struct defining the optimizer arguments using ArgAugmenter
pub struct OptimizerArgs;

impl ArgAugmenter for OptimizerArgs {
    type Output = Result<AlgorithmParameters>;

    /// Specifies arguments to add for the optimizer
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b> {
        app
      .arg(Arg::with_name("config")
           .short("c")
           .long("config")
           .takes_value(true)
           .help("JSON file holding the optimizer parameters.  Replaces the subcommand"))
      .arg(Arg::with_name("iters")
           .short("i")
           .long("iters")
           .takes_value(true)
           .help("Number of generations to run before exiting"))
      .arg(Arg::with_name("seed")
           .short("s")
           .long("seed")
           .takes_value(true)
           .help("Seed for the optimizer"))
      .arg(Arg::with_name("stop")
           .long("stop")
           .takes_value(true)
           .allow_hyphen_values(true)
           .help("Stops once the best weighted fitness reaches this value"))

      .subcommand(noise_args(SubCommand::with_name("ce")
          .about("Cross-entropy optimizer")
          .arg(distribution_arg("noisy"))
          .arg(Arg::with_name("pop-size")
               .long("pop-size")
               .takes_value(true)
               .help("Individuals per generation.  Defaults to 10"))
          .arg(Arg::with_name("rho")
               .long("rho")
               .takes_value(true)
               .help("Elite fraction.  Defaults to 0.9"))
          .arg(Arg::with_name("smoothing")
               .long("smoothing")
               .takes_value(true)
               .help("Weight of the previous distribution.  Defaults to 0"))
          .arg(Arg::with_name("temp-decay")
               .long("temp-decay")
               .takes_value(true)
               .help("Temperature decay; 0 disables annealing.  Defaults to 0"))))

      .subcommand(noise_args(SubCommand::with_name("face")
          .about("Cross-entropy with an adaptive population")
          .arg(distribution_arg("gaussian"))
          .arg(Arg::with_name("min-pop-size")
               .long("min-pop-size")
               .takes_value(true)
               .help("Smallest population.  Defaults to 20"))
          .arg(Arg::with_name("max-pop-size")
               .long("max-pop-size")
               .takes_value(true)
               .help("Largest population.  Defaults to 50"))
          .arg(Arg::with_name("n-elite")
               .long("n-elite")
               .takes_value(true)
               .help("Elite individuals per generation.  Defaults to 10"))
          .arg(Arg::with_name("smoothing")
               .long("smoothing")
               .takes_value(true)
               .help("Weight of the previous distribution.  Defaults to 0.2"))
          .arg(Arg::with_name("temp-decay")
               .long("temp-decay")
               .takes_value(true)
               .help("Temperature decay; 0 disables annealing.  Defaults to 0"))
          .arg(Arg::with_name("n-expand")
               .long("n-expand")
               .takes_value(true)
               .help("Jittered copies per elite individual.  Defaults to 5"))
          .arg(Arg::with_name("expand-sigma")
               .long("expand-sigma")
               .takes_value(true)
               .help("Relative jitter of the copies.  Defaults to 0.1"))
          .arg(Arg::with_name("improvement-scale")
               .long("improvement-scale")
               .takes_value(true)
               .help("Relative improvement that shrinks the population.  Defaults to 0.01"))))

      .subcommand(SubCommand::with_name("ga")
          .about("Genetic algorithm")
          .arg(Arg::with_name("popsize")
               .long("popsize")
               .takes_value(true)
               .help("Population size.  Defaults to 50"))
          .arg(Arg::with_name("cxpb")
               .long("cxpb")
               .takes_value(true)
               .help("Crossover probability.  Defaults to 0.5"))
          .arg(Arg::with_name("mutpb")
               .long("mutpb")
               .takes_value(true)
               .help("Mutation probability.  Defaults to 0.2"))
          .arg(Arg::with_name("indpb")
               .long("indpb")
               .takes_value(true)
               .help("Per-gene mutation probability.  Defaults to 0.02"))
          .arg(Arg::with_name("tournsize")
               .long("tournsize")
               .takes_value(true)
               .help("Tournament size.  Defaults to 15"))
          .arg(Arg::with_name("matepar")
               .long("matepar")
               .takes_value(true)
               .help("Blend crossover alpha.  Defaults to 0.5"))
          .arg(Arg::with_name("mutpar")
               .long("mutpar")
               .takes_value(true)
               .help("Standard deviation of the mutation.  Defaults to 1.0")))
    }

    /// Parses the arguments for the optimizer
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>) -> Self::Output {
        if let Some(path) = args.value_of("config") {
            return read_config(path);
        }

        let stop = value_or(args, "stop", std::f64::INFINITY)?;

        let params = if let Some(subargs) = args.subcommand_matches("ce") {
            AlgorithmParameters::CrossEntropy(CrossEntropyParameters {
                pop_size: value_or(subargs, "pop-size", 10)?,
                rho: value_or(subargs, "rho", 0.9)?,
                smoothing: value_or(subargs, "smoothing", 0.0)?,
                temp_decay: value_or(subargs, "temp-decay", 0.0)?,
                n_iteration: value_or(args, "iters", 1000)?,
                distribution: load_distribution(subargs)?,
                stop_criterion: stop,
                seed: value_or(args, "seed", 102)?,
            })
        } else if let Some(subargs) = args.subcommand_matches("face") {
            AlgorithmParameters::Face(FaceParameters {
                min_pop_size: value_or(subargs, "min-pop-size", 20)?,
                max_pop_size: value_or(subargs, "max-pop-size", 50)?,
                n_elite: value_or(subargs, "n-elite", 10)?,
                smoothing: value_or(subargs, "smoothing", 0.2)?,
                temp_decay: value_or(subargs, "temp-decay", 0.0)?,
                n_iteration: value_or(args, "iters", 30)?,
                distribution: load_distribution(subargs)?,
                n_expand: value_or(subargs, "n-expand", 5)?,
                stop_criterion: stop,
                seed: value_or(args, "seed", 102)?,
                expand_sigma: value_or(subargs, "expand-sigma", 0.1)?,
                improvement_scale: value_or(subargs, "improvement-scale", 0.01)?,
            })
        } else if let Some(subargs) = args.subcommand_matches("ga") {
            AlgorithmParameters::GeneticAlgorithm(GeneticAlgorithmParameters {
                seed: value_or(args, "seed", 42)?,
                popsize: value_or(subargs, "popsize", 50)?,
                cxpb: value_or(subargs, "cxpb", 0.5)?,
                mutpb: value_or(subargs, "mutpb", 0.2)?,
                ngen: value_or(args, "iters", 20)?,
                indpb: value_or(subargs, "indpb", 0.02)?,
                tournsize: value_or(subargs, "tournsize", 15)?,
                matepar: value_or(subargs, "matepar", 0.5)?,
                mutpar: value_or(subargs, "mutpar", 1.0)?,
            })
        } else {
            return Err(LtlError::config(
                "either --config or one of the ce, face, ga subcommands is required",
            ));
        };

        params.validate()?;
        Ok(params)
    }
}

/// Specifies the benchmark function to optimize
pub struct FunctionMeta {
    /// Cost function
    pub function: CostFunction,
    /// Number of dimensions
    pub dims: usize,
    /// Seed of the optimizee
    pub seed: u64,
    /// Standard deviation of the evaluation noise
    pub noise: f64,
    /// Objective weights
    pub weights: FitnessWeights,
}

/// Struct defining the optimizee arguments using ArgAugmenter
pub struct FunctionArgs;

impl ArgAugmenter for FunctionArgs {
    type Output = Result<FunctionMeta>;

    /// Specifies arguments to add for the optimizee
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b> {
        app.arg(
            Arg::with_name("function")
                .short("f")
                .long("function")
                .takes_value(true)
                .possible_values(&["sphere", "rastrigin", "rosenbrock", "ackley", "chasm"])
                .default_value("rastrigin")
                .help("Benchmark function to minimize"),
        )
        .arg(
            Arg::with_name("dims")
                .short("d")
                .long("dims")
                .takes_value(true)
                .help("Number of dimensions.  Defaults to 2"),
        )
        .arg(
            Arg::with_name("optimizee-seed")
                .long("optimizee-seed")
                .takes_value(true)
                .help("Seed for the initial individuals and the evaluation noise"),
        )
        .arg(
            Arg::with_name("noise")
                .long("noise")
                .takes_value(true)
                .help("Standard deviation of Gaussian noise added to each evaluation"),
        )
        .arg(
            Arg::with_name("weights")
                .short("w")
                .long("weights")
                .takes_value(true)
                .use_delimiter(true)
                .allow_hyphen_values(true)
                .help("Fitness weight of the single objective.  Defaults to -0.1"),
        )
    }

    /// Parses the arguments for the optimizee
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>) -> Self::Output {
        let function = CostFunction::from_name(args.value_of("function").unwrap_or("rastrigin"))?;
        let weights = match args.values_of("weights") {
            Some(vals) => {
                let parsed: std::result::Result<Vec<f64>, _> = vals.map(|v| v.parse()).collect();
                let w = parsed.map_err(|_| LtlError::config("weights must be numbers"))?;
                FitnessWeights::new(w)?
            }
            None => FitnessWeights::new(vec![-0.1])?,
        };
        if weights.len() != 1 {
            return Err(LtlError::config(format!(
                "benchmark functions have a single objective, got {} weights",
                weights.len()
            )));
        }

        Ok(FunctionMeta {
            function: function,
            dims: value_or(args, "dims", 2)?,
            seed: value_or(args, "optimizee-seed", 100)?,
            noise: value_or(args, "noise", 0.0)?,
            weights: weights,
        })
    }
}
