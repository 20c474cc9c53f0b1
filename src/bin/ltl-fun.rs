extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate ltl;
extern crate ltl_core;
extern crate ltl_optimizees;

use clap::{App, Arg, ArgMatches};
use env_logger::{Builder, Env};

use ltl_core::Result;
use ltl_optimizees::FunctionOptimizee;

use ltl::bin_utils::args::{ArgAugmenter, FunctionArgs, OptimizerArgs};
use ltl::bin_utils::loaders::{build_optimizer, write_report};
use ltl::runner::{run_parallel, run_sequential};

fn run(args: &ArgMatches) -> Result<()> {
    let params = OptimizerArgs.load_from_args(args)?;
    let fm = FunctionArgs.load_from_args(args)?;

    info!(
        "Optimizing {} in {} dimensions, weights {:?}",
        fm.function,
        fm.dims,
        fm.weights.values()
    );
    let optimizee = FunctionOptimizee::new(fm.function, fm.dims, fm.seed)?.with_noise(fm.noise)?;
    let sim = optimizee.simulator();
    let spec = optimizee.spec();

    let mut opt = build_optimizer(params, optimizee, fm.weights, spec)?;
    let report = if args.is_present("parallel") {
        run_parallel(opt.as_mut(), &sim)?
    } else {
        run_sequential(opt.as_mut(), &sim)?
    };

    println!("{}", report);
    write_report(&report, args.value_of("save_report"))
}

fn parse<'a>() -> ArgMatches<'a> {
    let base = App::new("LTL-Fun")
        .version("0.1.0")
        .about("Black-box optimization of benchmark functions");

    let base = OptimizerArgs.add_args(base);
    let base = FunctionArgs.add_args(base);
    base.arg(
        Arg::with_name("parallel")
            .long("parallel")
            .help("If provided, evaluates each generation on the thread pool"),
    )
    .arg(
        Arg::with_name("save_report")
            .long("save-report")
            .takes_value(true)
            .help("Writes the final report as JSON to a path"),
    )
    .get_matches()
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
