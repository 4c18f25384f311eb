/// Execute an aggregate command in place: decide, then apply each event.
///
/// No IO and no persistence. For the stored pipeline (load, optimistic
/// append, publish) use the infrastructure `CommandDispatcher`.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: clearway_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
