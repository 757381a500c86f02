//! Сглаживание Mould: двухпроходный box blur с фиксированными клетками
//!
//! ## Буферы
//!
//! - **A** (`heights_a`) — исходные высоты дополненной области; после вызова в нём итог
//! - **B** (`heights_b`) — промежуточный буфер: результат горизонтального прохода
//! - **маска** — размером с область без отступа, индексируется со сдвигом `smooth_radius`
//!
//! ## Порядок работы
//!
//! 1. Строки `[r, height + r)` делятся на полосы (`partition::plan_jobs`)
//! 2. Горизонтальный проход: по потоку на полосу, A → B; фиксированные клетки
//!    пишутся сразу в оба буфера
//! 3. Барьер (все потоки завершены)
//! 4. Вертикальный проход: по потоку на полосу, B → A; фиксированные клетки пропускаются
//! 5. Барьер
//!
//! Полосы не пересекаются, поэтому каждый поток получает собственный `&mut` срез
//! строк. Между проходами буферы меняются ролями только после `join` всех потоков.

use crate::config::MouldSettings;
use crate::error::{MouldError, MouldResult};
use crate::heightmap::Heightmap;
use crate::partition::{JobPlan, RowBand, plan_jobs};
use crate::region::{Region, ScratchMask, is_fixed};
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use tracing::{debug, trace};

/// Стадия операции; переходы только вперёд, без отмены и повторов
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum BlurState {
    NotStarted,
    HorizontalRunning,
    VerticalRunning,
    Done,
}

impl fmt::Display for BlurState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlurState::NotStarted => "not-started",
            BlurState::HorizontalRunning => "horizontal",
            BlurState::VerticalRunning => "vertical",
            BlurState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Сводка по одному вызову `MouldBlur::apply`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MouldReport {
    pub job_count: usize,
    pub row_span: usize,
    pub fixed_cells: usize,
    pub smoothed_cells: usize,
    pub state: BlurState,
}

/// Инструмент Mould: смещение рейкаста фиксируется при создании
#[derive(Debug, Clone)]
pub struct MouldBlur {
    raycast_offset: f32,
    threads: Option<usize>,
}

impl MouldBlur {
    pub fn new(settings: &MouldSettings) -> Self {
        Self {
            raycast_offset: settings.mould_raycast_offset,
            threads: settings.threads,
        }
    }

    /// Заменяет опрос `available_parallelism` фиксированным числом потоков
    #[must_use]
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn raycast_offset(&self) -> f32 {
        self.raycast_offset
    }

    pub fn parallelism(&self) -> usize {
        self.threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Сглаживает дополненную область `region` в `heights_a`, сохраняя зафиксированные маской высоты
    ///
    /// Оба буфера должны иметь одинаковый размер, не меньше
    /// `(width + 2r) × (height + 2r)`; дополненная область начинается в (0, 0).
    /// Строки отступа в B читает вертикальный проход, поэтому B обычно создают
    /// копией A.
    /// Все проверки выполняются до запуска потоков. Вызов блокирует текущий поток
    /// до завершения обоих проходов.
    #[tracing::instrument(
        skip(self, mask, heights_a, heights_b),
        fields(width = region.width, height = region.height)
    )]
    pub fn apply(
        &self,
        region: &Region,
        smooth_radius: usize,
        mask: &ScratchMask,
        heights_a: &mut Heightmap,
        heights_b: &mut Heightmap,
    ) -> MouldResult<MouldReport> {
        self.validate(region, smooth_radius, mask, heights_a, heights_b)?;

        let geometry = PassGeometry {
            stride: heights_a.width,
            buffer_height: heights_a.height,
            region_width: region.width,
            region_height: region.height,
            smooth_radius,
            raycast_offset: self.raycast_offset,
        };
        let plan = plan_jobs(region.height, smooth_radius, self.parallelism());
        debug!(
            job_count = plan.job_count,
            row_span = plan.row_span,
            "planned mould jobs"
        );

        let mut state = BlurState::NotStarted;

        advance(&mut state, BlurState::HorizontalRunning);
        run_horizontal(&geometry, &plan, mask, heights_a, heights_b);

        advance(&mut state, BlurState::VerticalRunning);
        run_vertical(&geometry, &plan, mask, heights_a, heights_b);

        advance(&mut state, BlurState::Done);

        let fixed_cells = mask.fixed_count();
        Ok(MouldReport {
            job_count: plan.job_count,
            row_span: plan.row_span,
            fixed_cells,
            smoothed_cells: region.width * region.height - fixed_cells,
            state,
        })
    }

    fn validate(
        &self,
        region: &Region,
        smooth_radius: usize,
        mask: &ScratchMask,
        heights_a: &Heightmap,
        heights_b: &Heightmap,
    ) -> MouldResult<()> {
        if !self.raycast_offset.is_finite() {
            return Err(MouldError::InvalidRaycastOffset(self.raycast_offset));
        }
        if mask.width != region.width
            || mask.height != region.height
            || mask.data.len() != mask.width * mask.height
        {
            return Err(MouldError::MaskSizeMismatch {
                expected_width: region.width,
                expected_height: region.height,
                width: mask.width,
                height: mask.height,
            });
        }

        let expected_width = region.padded_width(smooth_radius);
        let expected_height = region.padded_height(smooth_radius);
        for (buffer, heights) in [("A", heights_a), ("B", heights_b)] {
            if heights.width < expected_width
                || heights.height < expected_height
                || heights.data.len() != heights.width * heights.height
            {
                return Err(MouldError::BufferTooSmall {
                    buffer,
                    expected_width,
                    expected_height,
                    width: heights.width,
                    height: heights.height,
                });
            }
        }

        if heights_a.width != heights_b.width || heights_a.height != heights_b.height {
            return Err(MouldError::BufferShapeMismatch {
                a_width: heights_a.width,
                a_height: heights_a.height,
                b_width: heights_b.width,
                b_height: heights_b.height,
            });
        }
        Ok(())
    }
}

fn advance(state: &mut BlurState, next: BlurState) {
    debug_assert!(next > *state, "mould state may only move forward");
    trace!(from = %state, to = %next, "mould state");
    *state = next;
}

/// Общие для обоих проходов размеры
#[derive(Debug, Clone, Copy)]
struct PassGeometry {
    /// Ширина строки буфера (может превышать дополненную ширину)
    stride: usize,
    buffer_height: usize,
    region_width: usize,
    region_height: usize,
    smooth_radius: usize,
    raycast_offset: f32,
}

/// Границы окна `[center - radius, center + radius]`, обрезанные снизу нулём и сверху `upper`
///
/// Окно никогда не бывает пустым, пока `center <= upper`.
pub fn clamp_window(center: usize, radius: usize, upper: usize) -> (usize, usize) {
    let lo = center.saturating_sub(radius);
    let hi = (center + radius).min(upper);
    debug_assert!(lo <= hi, "empty window at {center} (radius {radius}, upper {upper})");
    (lo, hi)
}

/// Разрезает буфер на непересекающиеся срезы строк, по одному на полосу
fn split_bands<'a>(data: &'a mut [f32], stride: usize, bands: &[RowBand]) -> Vec<&'a mut [f32]> {
    let mut rest = data;
    let mut consumed = 0;
    let mut chunks = Vec::with_capacity(bands.len());

    for band in bands {
        let (_, tail) = std::mem::take(&mut rest).split_at_mut((band.start - consumed) * stride);
        let (chunk, tail) = tail.split_at_mut(band.len() * stride);
        chunks.push(chunk);
        rest = tail;
        consumed = band.end;
    }
    chunks
}

fn run_horizontal(
    geometry: &PassGeometry,
    plan: &JobPlan,
    mask: &ScratchMask,
    heights_a: &mut Heightmap,
    heights_b: &mut Heightmap,
) {
    let a_bands = split_bands(&mut heights_a.data, geometry.stride, &plan.bands);
    let b_bands = split_bands(&mut heights_b.data, geometry.stride, &plan.bands);

    std::thread::scope(|scope| {
        for ((&band, a_rows), b_rows) in plan.bands.iter().zip(a_bands).zip(b_bands) {
            scope.spawn(move || horizontal_pass(geometry, band, mask, a_rows, b_rows));
        }
    });
    debug!("horizontal pass joined");
}

fn run_vertical(
    geometry: &PassGeometry,
    plan: &JobPlan,
    mask: &ScratchMask,
    heights_a: &mut Heightmap,
    heights_b: &Heightmap,
) {
    let a_bands = split_bands(&mut heights_a.data, geometry.stride, &plan.bands);
    let heights_b = heights_b.data.as_slice();

    std::thread::scope(|scope| {
        for (&band, a_rows) in plan.bands.iter().zip(a_bands) {
            scope.spawn(move || vertical_pass(geometry, band, mask, heights_b, a_rows));
        }
    });
    debug!("vertical pass joined");
}

/// Горизонтальный проход по полосе строк: A → B
///
/// `a_rows` и `b_rows` — строки полосы `band` в буферах A и B. Окно читает только
/// текущую строку A, поэтому фиксированная клетка, записанная в A раньше по строке,
/// попадает в окна следующих клеток той же строки.
fn horizontal_pass(
    geometry: &PassGeometry,
    band: RowBand,
    mask: &ScratchMask,
    a_rows: &mut [f32],
    b_rows: &mut [f32],
) {
    let stride = geometry.stride;
    let r = geometry.smooth_radius;
    let x_end = geometry.region_width + r;
    let upper = (geometry.region_width + r * 2).min(stride.saturating_sub(1));
    debug_assert_eq!(a_rows.len(), band.len() * stride);
    trace!(start = band.start, end = band.end, "horizontal band");

    for (local_y, y) in band.rows().enumerate() {
        let a_row = &mut a_rows[local_y * stride..(local_y + 1) * stride];
        let b_row = &mut b_rows[local_y * stride..(local_y + 1) * stride];
        let mask_row = mask.row(y - r);

        for x in r..x_end {
            let mask_value = mask_row[x - r];
            if is_fixed(mask_value) {
                let fixed = mask_value - geometry.raycast_offset;
                b_row[x] = fixed;
                a_row[x] = fixed;
                continue;
            }

            let (i_min, i_max) = clamp_window(x, r, upper);
            let sum = a_row[i_min..=i_max].iter().fold(0.0_f32, |acc, &h| acc + h);
            b_row[x] = sum / (i_max + 1 - i_min) as f32;
        }
    }
}

/// Вертикальный проход по полосе строк: B → A
///
/// B читается целиком (соседние полосы), пишутся только строки полосы в A.
/// Верхняя граница окна считается от высоты области, как и в горизонтальном проходе
/// от ширины, и дополнительно не выходит за последнюю строку буфера.
fn vertical_pass(
    geometry: &PassGeometry,
    band: RowBand,
    mask: &ScratchMask,
    heights_b: &[f32],
    a_rows: &mut [f32],
) {
    let stride = geometry.stride;
    let r = geometry.smooth_radius;
    let x_end = geometry.region_width + r;
    let upper = (geometry.region_height + r * 2).min(geometry.buffer_height.saturating_sub(1));
    trace!(start = band.start, end = band.end, "vertical band");

    for (local_y, y) in band.rows().enumerate() {
        let a_row = &mut a_rows[local_y * stride..(local_y + 1) * stride];
        let mask_row = mask.row(y - r);
        let (i_min, i_max) = clamp_window(y, r, upper);
        let count = (i_max + 1 - i_min) as f32;

        for x in r..x_end {
            // Фиксированные клетки уже записаны в оба буфера горизонтальным проходом
            if is_fixed(mask_row[x - r]) {
                continue;
            }

            let sum = (i_min..=i_max).fold(0.0_f32, |acc, i| acc + heights_b[i * stride + x]);
            a_row[x] = sum / count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn blur(threads: usize, offset: f32) -> MouldBlur {
        MouldBlur::new(&MouldSettings {
            mould_raycast_offset: offset,
            ..MouldSettings::default()
        })
        .with_parallelism(threads)
    }

    #[test]
    fn clamp_window_shrinks_at_both_ends() {
        assert_eq!(clamp_window(0, 2, 9), (0, 2));
        assert_eq!(clamp_window(1, 2, 9), (0, 3));
        assert_eq!(clamp_window(5, 2, 9), (3, 7));
        assert_eq!(clamp_window(9, 2, 9), (7, 9));
        assert_eq!(clamp_window(4, 0, 9), (4, 4));
    }

    #[test]
    fn split_bands_hands_out_band_rows() {
        let mut data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let bands = [RowBand { start: 1, end: 2 }, RowBand { start: 2, end: 4 }];
        let chunks = split_bands(&mut data, 2, &bands);
        assert_eq!(chunks.len(), 2);
        assert_eq!(&*chunks[0], &[2.0, 3.0]);
        assert_eq!(&*chunks[1], &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn horizontal_pass_averages_clamped_row_window() {
        // Область 3×1, радиус 1: дополненный буфер 5×3
        let geometry = PassGeometry {
            stride: 5,
            buffer_height: 3,
            region_width: 3,
            region_height: 1,
            smooth_radius: 1,
            raycast_offset: 0.0,
        };
        let mask = ScratchMask::new(3, 1);
        let mut a_row = vec![0.0, 3.0, 6.0, 9.0, 30.0];
        let mut b_row = vec![-5.0; 5];

        horizontal_pass(
            &geometry,
            RowBand { start: 1, end: 2 },
            &mask,
            &mut a_row,
            &mut b_row,
        );

        // Границы дополнения (x = 0 и x = 4) не пишутся
        assert_eq!(b_row[0], -5.0);
        assert_eq!(b_row[4], -5.0);
        assert_relative_eq!(b_row[1], 3.0);
        assert_relative_eq!(b_row[2], 6.0);
        assert_relative_eq!(b_row[3], 15.0);
        assert_eq!(a_row, vec![0.0, 3.0, 6.0, 9.0, 30.0]);
    }

    #[test]
    fn fixed_cell_feeds_later_cells_in_the_row() {
        let geometry = PassGeometry {
            stride: 5,
            buffer_height: 3,
            region_width: 3,
            region_height: 1,
            smooth_radius: 1,
            raycast_offset: 1.0,
        };
        let mut mask = ScratchMask::new(3, 1);
        mask.set_hit(0, 0, 10.0);
        let mut a_row = vec![0.0; 5];
        let mut b_row = vec![0.0; 5];

        horizontal_pass(
            &geometry,
            RowBand { start: 1, end: 2 },
            &mask,
            &mut a_row,
            &mut b_row,
        );

        assert_eq!(a_row[1], 9.0);
        assert_eq!(b_row[1], 9.0);
        assert_relative_eq!(b_row[2], 3.0);
        assert_relative_eq!(b_row[3], 0.0);
    }

    #[test]
    fn zero_radius_is_identity_except_fixed_cells() {
        let region = Region::new(0, 0, 3, 2);
        let mut mask = ScratchMask::for_region(&region);
        mask.set_hit(2, 1, 4.0);
        let mut a = Heightmap::from_fn(3, 2, |x, y| (x * 7 + y) as f32);
        let before = a.clone();
        let mut b = Heightmap::new(3, 2);

        let report = blur(2, 0.5).apply(&region, 0, &mask, &mut a, &mut b).unwrap();

        assert_eq!(report.fixed_cells, 1);
        assert_eq!(report.smoothed_cells, 5);
        assert_eq!(report.state, BlurState::Done);
        assert_eq!(a.get(2, 1), 3.5);
        for (i, (&after, &orig)) in a.data.iter().zip(&before.data).enumerate() {
            if i != 5 {
                assert_eq!(after, orig);
            }
        }
    }

    #[test]
    fn rejects_small_buffer_before_running() {
        let region = Region::new(0, 0, 4, 4);
        let mask = ScratchMask::for_region(&region);
        let mut a = Heightmap::filled(6, 5, 1.0);
        let mut b = Heightmap::filled(6, 6, 1.0);

        let err = blur(1, 0.0)
            .apply(&region, 1, &mask, &mut a, &mut b)
            .unwrap_err();
        assert!(matches!(err, MouldError::BufferTooSmall { buffer: "A", .. }));
        assert!(a.data.iter().all(|&h| h == 1.0));
    }

    #[test]
    fn rejects_mismatched_mask() {
        let region = Region::new(0, 0, 4, 4);
        let mask = ScratchMask::new(4, 3);
        let mut a = Heightmap::new(6, 6);
        let mut b = Heightmap::new(6, 6);

        let err = blur(1, 0.0)
            .apply(&region, 1, &mask, &mut a, &mut b)
            .unwrap_err();
        assert!(matches!(err, MouldError::MaskSizeMismatch { .. }));
    }

    #[test]
    fn rejects_buffers_of_different_shape() {
        let region = Region::new(0, 0, 2, 2);
        let mask = ScratchMask::for_region(&region);
        let mut a = Heightmap::new(4, 4);
        let mut b = Heightmap::new(5, 4);

        let err = blur(1, 0.0)
            .apply(&region, 1, &mask, &mut a, &mut b)
            .unwrap_err();
        assert!(matches!(err, MouldError::BufferShapeMismatch { .. }));
    }

    #[test]
    fn rejects_non_finite_offset() {
        let region = Region::new(0, 0, 1, 1);
        let mask = ScratchMask::for_region(&region);
        let mut a = Heightmap::new(1, 1);
        let mut b = Heightmap::new(1, 1);

        let err = blur(1, f32::NAN)
            .apply(&region, 0, &mask, &mut a, &mut b)
            .unwrap_err();
        assert!(matches!(err, MouldError::InvalidRaycastOffset(_)));
    }

    #[test]
    fn empty_region_runs_one_idle_job() {
        let region = Region::new(5, 5, 0, 0);
        let mask = ScratchMask::for_region(&region);
        let mut a = Heightmap::filled(4, 4, 2.0);
        let mut b = Heightmap::filled(4, 4, 2.0);

        let report = blur(8, 0.0).apply(&region, 2, &mask, &mut a, &mut b).unwrap();
        assert_eq!(report.job_count, 1);
        assert_eq!(report.smoothed_cells, 0);
        assert!(a.data.iter().all(|&h| h == 2.0));
    }

    #[test]
    fn settings_are_captured_at_construction() {
        assert_eq!(blur(3, 0.5).raycast_offset(), 0.5);
        assert_eq!(blur(3, 0.5).parallelism(), 3);
        assert_eq!(blur(0, 0.0).parallelism(), 1);
        assert!(MouldBlur::new(&MouldSettings::default()).parallelism() >= 1);
    }
}
