use super::*;

fn nop() -> Instruction {
    Instruction::Effect {
        op: "nop".to_string(),
        args: Vec::new(),
        funcs: Vec::new(),
        labels: Vec::new(),
    }
}

#[test]
fn activates_on_the_hot_call() {
    let mut tracer = Tracer::new(true, 3);

    assert!(!tracer.enter_call("f"));
    tracer.exit_call("f", false);
    assert!(!tracer.enter_call("f"));
    tracer.exit_call("f", false);

    let activated = tracer.enter_call("f");
    assert!(activated);

    tracer.record(&nop());
    tracer.record(&nop());
    tracer.exit_call("f", activated);

    assert_eq!(2, tracer.traces()["f"].len());
}

#[test]
fn fully_traced_functions_are_never_recorded_again() {
    let mut tracer = Tracer::new(true, 1);

    let activated = tracer.enter_call("f");
    assert!(activated);
    tracer.record(&nop());
    tracer.exit_call("f", activated);

    assert!(!tracer.enter_call("f"));
    tracer.record(&nop());
    tracer.exit_call("f", false);

    assert_eq!(1, tracer.traces()["f"].len());
}

#[test]
fn inner_calls_do_not_nest_traces() {
    let mut tracer = Tracer::new(true, 1);

    let outer = tracer.enter_call("outer");
    assert!(outer);

    // inner reaches its own threshold but a trace is already active
    let inner = tracer.enter_call("inner");
    assert!(!inner);
    tracer.record(&nop());
    tracer.exit_call("inner", inner);

    tracer.exit_call("outer", outer);

    assert!(tracer.traces().contains_key("outer"));
    assert!(!tracer.traces().contains_key("inner"));
    assert_eq!(1, tracer.traces()["outer"].len());
}

#[test]
fn disabled_tracer_stays_idle() {
    let mut tracer = Tracer::new(false, 1);

    assert!(!tracer.enter_call("f"));
    tracer.record(&nop());

    assert!(tracer.traces().is_empty());
}
