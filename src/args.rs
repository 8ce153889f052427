use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub struct Args {
    /// count executed instructions; report `total_dyn_inst` to stderr at exit
    #[structopt(short = "p", long = "profile")]
    pub profile: bool,

    /// reference-count named pointer bindings and free allocations nobody
    /// names any more
    #[structopt(long = "gc")]
    pub gc: bool,

    /// treat `free` instructions as no-ops
    #[structopt(long = "defer-free")]
    pub defer_free: bool,

    /// record hot-function traces; dump the trace map to stdout at exit
    #[structopt(long = "trace")]
    pub trace: bool,

    /// call count at which a function becomes hot
    #[structopt(long = "hot-threshold", default_value = "5")]
    pub hot_threshold: u64,

    /// interpreter: log heap alloc/free events
    #[structopt(long = "trace-heap")]
    pub trace_heap: bool,

    /// interpreter: log reference count movement
    #[structopt(long = "trace-rc")]
    pub trace_rc: bool,

    /// arguments for the entry function, one per declared parameter
    #[structopt(name = "ARGS", allow_hyphen_values = true)]
    pub entry_args: Vec<String>,
}
