// Tank aggregator - window, parse and bucket raw rows by tank
use crate::domain::error::AggregateError;
use crate::domain::reading::{Reading, TankId};
use crate::domain::tank::TankBuckets;

/// Keep the last `recent_window` rows, parse them and bucket by tank.
///
/// Every tank in `expected_tanks` gets a bucket, even when empty. A parse
/// failure or a tank outside `expected_tanks` rejects the whole batch.
pub fn aggregate<R: AsRef<[String]>>(
    rows: &[R],
    recent_window: usize,
    expected_tanks: &[TankId],
) -> Result<TankBuckets, AggregateError> {
    let start = rows.len().saturating_sub(recent_window);
    let mut buckets = TankBuckets::for_tanks(expected_tanks);

    for (offset, raw) in rows[start..].iter().enumerate() {
        let row = start + offset;
        let reading =
            Reading::parse(raw.as_ref()).map_err(|source| AggregateError::Parse { row, source })?;

        let tank = reading.tank;
        buckets
            .get_mut(tank)
            .ok_or(AggregateError::UnknownTank { row, tank })?
            .readings
            .push(reading);
    }

    Ok(buckets)
}
