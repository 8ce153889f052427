use crate::args::Args;
use interpreter::ExecError;
use interpreter::ExecResult;
use interpreter::Interpreter;
use interpreter::Opts;
use ir_lang::Program;
use std::io;
use std::process;
use structopt::StructOpt;

mod args;

fn run(args: &Args) -> ExecResult<()> {
    let program: Program = serde_json::from_reader(io::stdin())
        .map_err(|err| ExecError::illegal_state(format!("invalid program input: {}", err)))?;

    let opts = Opts {
        enable_gc: args.gc,
        defer_free: args.defer_free,
        trace: args.trace,
        hot_threshold: args.hot_threshold,
        trace_heap: args.trace_heap,
        trace_rc: args.trace_rc,
    };

    let mut interpreter = Interpreter::new(program, opts, Box::new(io::stdout()))?;

    interpreter.run_main(&args.entry_args)?;
    interpreter.finalize()?;

    if args.profile {
        eprintln!("total_dyn_inst: {}", interpreter.instruction_count());
    }

    if args.trace {
        let dump = serde_json::to_string_pretty(interpreter.traces())
            .map_err(|err| ExecError::illegal_state(format!("trace dump failed: {}", err)))?;
        println!("{}", dump);
    }

    Ok(())
}

fn main() {
    let args = Args::from_args();

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        process::exit(2);
    }
}
