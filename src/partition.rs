//! Разбиение области на полосы строк для рабочих потоков
//!
//! Каждая полоса — непрерывный диапазон строк дополненного буфера. Полосы
//! вычисляются заранее, до запуска потоков, и не пересекаются: поток владеет
//! своими строками целиком, поэтому блокировки не нужны.

use std::ops::Range;

/// Полоса строк `[start, end)` в координатах дополненного буфера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBand {
    pub start: usize,
    pub end: usize,
}

impl RowBand {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// План заданий: число потоков, высота полосы и сами полосы по возрастанию
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    pub job_count: usize,
    pub row_span: usize,
    pub bands: Vec<RowBand>,
}

/// Делит строки `[smooth_radius, region_height + smooth_radius)` между потоками
///
/// `job_count = clamp(min(parallelism, 4 * region_height), 1, region_height)`,
/// затем `row_span = ceil(region_height / job_count)` и `job_count` пересчитывается
/// как `ceil(region_height / row_span)`, чтобы ни одна полоса не оказалась пустой.
/// Для пустой области возвращается одно задание с пустой полосой.
pub fn plan_jobs(region_height: usize, smooth_radius: usize, parallelism: usize) -> JobPlan {
    if region_height == 0 {
        return JobPlan {
            job_count: 1,
            row_span: 0,
            bands: vec![RowBand {
                start: smooth_radius,
                end: smooth_radius,
            }],
        };
    }

    let job_count = parallelism
        .min(region_height.saturating_mul(4))
        .clamp(1, region_height);
    let row_span = region_height.div_ceil(job_count);
    let job_count = region_height.div_ceil(row_span);
    let max_y = region_height + smooth_radius;

    let bands = (0..job_count)
        .map(|i| {
            let start = smooth_radius + i * row_span;
            RowBand {
                start,
                end: (start + row_span).min(max_y),
            }
        })
        .collect();

    JobPlan {
        job_count,
        row_span,
        bands,
    }
}
