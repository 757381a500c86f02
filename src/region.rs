//! Область лепки и маска фиксированных высот
//!
//! - **`Region`** — прямоугольник в координатах сетки, который редактирует кисть (без отступа)
//! - **`ScratchMask`** — маска размером с область: `SENTINEL` означает «сгладить»,
//!   любое другое значение — высота попадания рейкаста, которую нужно зафиксировать
//!
//! Маску заполняет внешний код (рейкаст под кистью). Здесь же лежат два простых
//! генератора маски, имитирующих попадания, — для CLI и тестов.

use crate::config::{PlateauSettings, ScatterSettings};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Значение маски «не зафиксировано»
pub const SENTINEL: f32 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Ширина области с отступом `smooth_radius` с каждой стороны
    pub fn padded_width(&self, smooth_radius: usize) -> usize {
        self.width + smooth_radius * 2
    }

    pub fn padded_height(&self, smooth_radius: usize) -> usize {
        self.height + smooth_radius * 2
    }
}

/// Маска попаданий рейкаста, строки подряд: `data[y * width + x]`
#[derive(Debug, Clone, PartialEq)]
pub struct ScratchMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl ScratchMask {
    /// Маска без фиксированных клеток
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![SENTINEL; width * height],
        }
    }

    pub fn for_region(region: &Region) -> Self {
        Self::new(region.width, region.height)
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Отмечает попадание рейкаста на высоте `hit_height`
    ///
    /// `SENTINEL` нельзя зафиксировать: он неотличим от «не зафиксировано».
    pub fn set_hit(&mut self, x: usize, y: usize, hit_height: f32) {
        self.data[y * self.width + x] = hit_height;
    }

    pub fn clear(&mut self, x: usize, y: usize) {
        self.data[y * self.width + x] = SENTINEL;
    }

    pub fn is_fixed(&self, x: usize, y: usize) -> bool {
        is_fixed(self.get(x, y))
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn fixed_count(&self) -> usize {
        self.data.iter().filter(|&&v| is_fixed(v)).count()
    }
}

#[inline]
pub fn is_fixed(mask_value: f32) -> bool {
    mask_value != SENTINEL
}

/// Заполняет прямоугольник плато одной высотой попадания (обрезается по маске)
pub fn stamp_plateau(mask: &mut ScratchMask, plateau: &PlateauSettings) {
    let x_end = (plateau.x + plateau.width).min(mask.width);
    let y_end = (plateau.y + plateau.height).min(mask.height);

    for y in plateau.y..y_end {
        for x in plateau.x..x_end {
            mask.set_hit(x, y, plateau.hit_height);
        }
    }
}

/// Разбрасывает `count` случайных попаданий (повторы по одной клетке допустимы)
pub fn scatter_fixed_cells(mask: &mut ScratchMask, seed: u64, scatter: &ScatterSettings) {
    if mask.width == 0 || mask.height == 0 {
        return;
    }
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

    for _ in 0..scatter.count {
        let x = rng.gen_range(0..mask.width);
        let y = rng.gen_range(0..mask.height);
        let hit = if scatter.max_height > scatter.min_height {
            rng.gen_range(scatter.min_height..scatter.max_height)
        } else {
            scatter.min_height
        };
        // Попадание ровно в SENTINEL потеряло бы фиксацию
        let hit = if is_fixed(hit) { hit } else { hit + f32::EPSILON };
        mask.set_hit(x, y, hit);
    }
}
