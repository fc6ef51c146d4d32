use tracing::debug;

use super::rules::{classify_token, is_likely_name, Cell};
use super::{LeaderboardEntry, LeaderboardSettings};
use crate::ocr::Detection;

/// Stats found in one rider's stats row.
#[derive(Debug, Default)]
struct RowCells {
    time_delta: Option<String>,
    watts_per_kg: Option<f32>,
    distance_km: Option<f32>,
}

impl RowCells {
    fn has_numeric(&self) -> bool {
        self.watts_per_kg.is_some() || self.distance_km.is_some()
    }

    fn is_noise(&self) -> bool {
        !self.has_numeric() && self.time_delta.is_none()
    }

    /// Fills the cell's column unless an earlier token already claimed it.
    fn claim(&mut self, cell: Cell) {
        match cell {
            Cell::TimeDelta(delta) => {
                self.time_delta.get_or_insert(delta);
            }
            Cell::Distance(km) => {
                self.distance_km.get_or_insert(km);
            }
            Cell::WattsPerKg(wkg) => {
                self.watts_per_kg.get_or_insert(wkg);
            }
        }
    }
}

/// Rebuilds ranked entries from the detections of one leaderboard region.
///
/// Coordinates are region pixels; `settings` must already be scaled to the
/// frame. An empty result is a normal outcome.
pub fn reconstruct(detections: &[Detection], settings: &LeaderboardSettings) -> Vec<LeaderboardEntry> {
    reconstruct_rows(detections, settings)
        .into_iter()
        .map(|(_, entry)| entry)
        .collect()
}

/// Same as [`reconstruct`], keeping each entry's name-token y.
pub(crate) fn reconstruct_rows(
    detections: &[Detection],
    settings: &LeaderboardSettings,
) -> Vec<(f32, LeaderboardEntry)> {
    let mut sorted: Vec<&Detection> = detections.iter().collect();
    sorted.sort_by(|a, b| {
        a.y()
            .total_cmp(&b.y())
            .then(a.x().total_cmp(&b.x()))
            .then_with(|| a.text.cmp(&b.text))
    });

    let mut names: Vec<&Detection> = sorted
        .iter()
        .copied()
        .filter(|det| is_likely_name(&det.text))
        .collect();

    if let Some(first) = names.first() {
        if first.y() < settings.title_cutoff_y {
            debug!("Dropping title token {:?} at y={:.1}", first.text, first.y());
            names.remove(0);
        }
    }

    let mut rows: Vec<(&Detection, RowCells)> = Vec::with_capacity(names.len());
    for name in names {
        let top = name.y() + settings.min_row_gap;
        let bottom = name.y() + settings.max_row_gap;

        let mut band: Vec<&Detection> = sorted
            .iter()
            .copied()
            .filter(|det| det.y() > top && det.y() <= bottom)
            .collect();
        band.sort_by(|a, b| {
            a.x()
                .total_cmp(&b.x())
                .then(a.y().total_cmp(&b.y()))
                .then_with(|| a.text.cmp(&b.text))
        });

        let mut cells = RowCells::default();
        for token in band {
            if let Some((rule, cell)) = classify_token(token, settings) {
                debug!("{:?}: {:?} -> {}", name.text, token.text, rule);
                cells.claim(cell);
            }
        }

        if cells.is_noise() {
            debug!("Dropping {:?}: no stats in its row", name.text);
            continue;
        }
        rows.push((name, cells));
    }

    let own_rows: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, (_, cells))| cells.time_delta.is_none() && cells.has_numeric())
        .map(|(i, _)| i)
        .collect();
    let current = match own_rows.as_slice() {
        [only] => Some(*only),
        [] => None,
        ambiguous => {
            debug!("{} rows lack a time delta, not flagging any", ambiguous.len());
            None
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(i, (name, cells))| {
            let entry = LeaderboardEntry {
                position: i as u32 + 1,
                name: name.text.trim().to_string(),
                time_delta: cells.time_delta,
                watts_per_kg: cells.watts_per_kg,
                distance_km: cells.distance_km,
                is_current_rider: current == Some(i),
            };
            (name.y(), entry)
        })
        .collect()
}
