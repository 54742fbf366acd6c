/// Execute an aggregate command in place (decide, then evolve). No IO.
///
/// The persistent pipeline lives in the infra crate's `CommandDispatcher`;
/// this is the same lifecycle without storage, used by domain tests and by
/// ledger replay checks.
pub fn execute<A>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error>
where
    A: stockroom_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
