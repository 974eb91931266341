//! Column assignment for overlapping appointments within one member's lane
//!
//! Appointments are visited in start order and each takes the lowest column
//! whose previous occupant has already ended. For interval graphs this greedy
//! pass uses exactly as many columns as the largest number of appointments
//! active at the same instant.

/// Half-open overlap test: `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`.
pub fn overlaps(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Result of assigning display columns to a lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAssignment {
    /// Column index per input span, in input order
    pub columns: Vec<usize>,
    /// Number of columns used, at least 1
    pub max_columns: usize,
}

/// Indices of `spans` sorted by start time, ties kept in input order.
pub fn chronological_order(spans: &[(u32, u32)]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| spans[i].0);
    order
}

/// Assigns a column to every `(start, end)` span so that overlapping spans never share one.
pub fn assign_columns(spans: &[(u32, u32)]) -> ColumnAssignment {
    let mut columns = vec![0; spans.len()];
    // end of the latest span placed in each column
    let mut column_ends: Vec<u32> = Vec::new();

    for idx in chronological_order(spans) {
        let (start, end) = spans[idx];
        let column = match column_ends.iter().position(|&busy_until| busy_until <= start) {
            Some(free) => {
                column_ends[free] = end;
                free
            }
            None => {
                column_ends.push(end);
                column_ends.len() - 1
            }
        };
        columns[idx] = column;
    }

    ColumnAssignment {
        columns,
        max_columns: column_ends.len().max(1),
    }
}

/// Largest number of spans active at any instant.
pub fn max_concurrency(spans: &[(u32, u32)]) -> usize {
    let mut events: Vec<(u32, i32)> = spans
        .iter()
        .flat_map(|&(start, end)| [(start, 1), (end, -1)])
        .collect();
    // ends sort before starts at the same instant (half-open intervals)
    events.sort();

    let mut active = 0i32;
    let mut peak = 0i32;
    for (_, delta) in events {
        active += delta;
        peak = peak.max(active);
    }
    peak as usize
}
