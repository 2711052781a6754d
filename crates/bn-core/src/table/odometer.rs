//! Mixed-radix enumeration of joint state assignments.
//!
//! Every table in this crate lays its rows out in the same order: the
//! assignment `[s0, s1, .., sk]` over cardinalities `[r0, r1, .., rk]` lives at
//! index `((s0 * r1 + s1) * r2 + s2) ...`, i.e. the last position varies
//! fastest. An empty radix list has exactly one assignment, `[]`.

use bn_common::{Error, Result};

/// Largest number of cells any dense table may hold (128 MiB of `f64`).
pub const MAX_TABLE_CELLS: usize = 1 << 24;

/// Number of assignments over `radices`, or `None` on overflow.
pub fn assignment_count(radices: &[usize]) -> Option<usize> {
    radices.iter().try_fold(1usize, |acc, &r| acc.checked_mul(r))
}

/// Cells of a dense table with `width` entries per assignment over
/// `radices`. Fails with `TableTooLarge` past [`MAX_TABLE_CELLS`].
pub fn table_cells(radices: &[usize], width: usize) -> Result<usize> {
    assignment_count(radices)
        .and_then(|rows| rows.checked_mul(width))
        .filter(|&cells| cells <= MAX_TABLE_CELLS)
        .ok_or(Error::TableTooLarge {
            variables: radices.len(),
            limit: MAX_TABLE_CELLS,
        })
}

/// Flat index of `digits`, or `None` if the arity differs or any digit is
/// out of range.
pub fn encode(radices: &[usize], digits: &[usize]) -> Option<usize> {
    if radices.len() != digits.len() {
        return None;
    }
    let mut index = 0usize;
    for (&radix, &digit) in radices.iter().zip(digits) {
        if digit >= radix {
            return None;
        }
        index = index * radix + digit;
    }
    Some(index)
}

/// Assignment stored at flat `index`. The caller guarantees `index` is in range.
pub fn decode(radices: &[usize], mut index: usize) -> Vec<usize> {
    let mut digits = vec![0; radices.len()];
    for (slot, &radix) in digits.iter_mut().zip(radices).rev() {
        *slot = index % radix;
        index /= radix;
    }
    digits
}

/// Product of the radices after `position`: the distance between two
/// indices that differ by one in that digit.
pub(crate) fn stride(radices: &[usize], position: usize) -> usize {
    radices[position + 1..].iter().product()
}

/// Iterator over every assignment in table order.
///
/// ```
/// use bn_core::table::StateOdometer;
///
/// let all: Vec<Vec<usize>> = StateOdometer::new(&[2, 3]).collect();
/// assert_eq!(all.len(), 6);
/// assert_eq!(all[1], vec![0, 1]);
/// assert_eq!(all[3], vec![1, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct StateOdometer {
    radices: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl StateOdometer {
    pub fn new(radices: &[usize]) -> Self {
        let next = if radices.iter().any(|&r| r == 0) {
            None
        } else {
            Some(vec![0; radices.len()])
        };
        Self {
            radices: radices.to_vec(),
            next,
        }
    }
}

impl Iterator for StateOdometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        let mut position = advanced.len();
        let mut rolled_over = true;
        while position > 0 {
            position -= 1;
            advanced[position] += 1;
            if advanced[position] < self.radices[position] {
                rolled_over = false;
                break;
            }
            advanced[position] = 0;
        }
        if !rolled_over {
            self.next = Some(advanced);
        }
        Some(current)
    }
}
