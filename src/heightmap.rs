use crate::config::TerrainSettings;
use crate::error::{MouldError, MouldResult};
use crate::region::Region;
use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use image::{ImageBuffer, Luma};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::path::Path;

/// Двумерная карта высот, строки подряд (row-major): `data[y * width + x]`
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Heightmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Строит карту, вычисляя высоту каждой клетки через `f(x, y)`
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Копирует область `region` с отступом `smooth_radius` в новую карту
    ///
    /// Клетки отступа за краем карты берут значение ближайшей клетки края.
    pub fn extract_padded(&self, region: &Region, smooth_radius: usize) -> Heightmap {
        let padded_width = region.padded_width(smooth_radius);
        let padded_height = region.padded_height(smooth_radius);
        if self.width == 0 || self.height == 0 {
            return Heightmap::new(padded_width, padded_height);
        }

        let clamp_axis = |origin: usize, offset: usize, len: usize| {
            (origin + offset)
                .saturating_sub(smooth_radius)
                .min(len - 1)
        };
        Heightmap::from_fn(padded_width, padded_height, |px, py| {
            self.get(
                clamp_axis(region.x, px, self.width),
                clamp_axis(region.y, py, self.height),
            )
        })
    }

    /// Возвращает в карту внутреннюю часть (без отступа) сглаженной области
    ///
    /// Клетки за пределами карты отбрасываются.
    pub fn write_region(&mut self, region: &Region, smooth_radius: usize, padded: &Heightmap) {
        for y in 0..region.height {
            let ty = region.y + y;
            if ty >= self.height {
                break;
            }
            for x in 0..region.width {
                let tx = region.x + x;
                if tx >= self.width {
                    break;
                }
                self.set(tx, ty, padded.get(x + smooth_radius, y + smooth_radius));
            }
        }
    }

    /// Минимум и максимум высот; `None` для пустой карты
    pub fn range(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        let min_h = self.data.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max_h = self.data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        Some((min_h, max_h))
    }

    /// Переводит высоты в 8-битные оттенки серого, нормируя по диапазону `[min_h, max_h]`
    pub fn to_grayscale_image(&self, min_h: f32, max_h: f32) -> Vec<u8> {
        let span = if max_h > min_h { max_h - min_h } else { 1.0 };
        let to_byte = |&v: &f32| (((v - min_h) / span).clamp(0.0, 1.0) * 255.0) as u8;

        #[cfg(feature = "parallel")]
        {
            self.data.par_iter().map(to_byte).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.data.iter().map(to_byte).collect()
        }
    }

    /// Сохраняет превью в PNG, нормируя по собственному диапазону высот
    pub fn save_as_png(&self, path: &Path) -> MouldResult<()> {
        let (min_h, max_h) = self.range().unwrap_or((0.0, 1.0));
        self.save_as_png_in_range(path, min_h, max_h)
    }

    /// Сохраняет превью в PNG с заданным диапазоном — удобно, чтобы «до» и «после» были сравнимы
    pub fn save_as_png_in_range(&self, path: &Path, min_h: f32, max_h: f32) -> MouldResult<()> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_raw(
            self.width as u32,
            self.height as u32,
            self.to_grayscale_image(min_h, max_h),
        )
        .ok_or_else(|| MouldError::config("Failed to create image buffer"))?;
        img.save(path)?;
        Ok(())
    }
}

/// Генерирует базовый рельеф для демонстрации: фрактальный шум, растянутый на `amplitude`
pub fn generate_base_terrain(
    seed: u64,
    width: usize,
    height: usize,
    terrain: &TerrainSettings,
) -> Heightmap {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(seed as i32));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(terrain.octaves));
    noise.set_frequency(Some(terrain.frequency));

    Heightmap::from_fn(width, height, |x, y| {
        // Шум в [-1, 1] → [0, amplitude]
        let n = ((noise.get_noise_2d(x as f32, y as f32) + 1.0) * 0.5).clamp(0.0, 1.0);
        n * terrain.amplitude
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_is_row_major() {
        let map = Heightmap::from_fn(3, 2, |x, y| (x + 10 * y) as f32);
        assert_eq!(map.data, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(map.get(2, 1), 12.0);
        assert_eq!(map.row(1), &[10.0, 11.0, 12.0]);
    }

    #[test]
    fn extract_padded_clamps_to_map_edges() {
        let map = Heightmap::from_fn(4, 3, |x, y| (x + 10 * y) as f32);
        let padded = map.extract_padded(&Region::new(0, 1, 2, 2), 1);

        assert_eq!(padded.width, 4);
        assert_eq!(padded.height, 4);
        assert_eq!(padded.row(0), &[0.0, 0.0, 1.0, 2.0]);
        assert_eq!(padded.row(1), &[10.0, 10.0, 11.0, 12.0]);
        assert_eq!(padded.row(3), &[20.0, 20.0, 21.0, 22.0]);
    }

    #[test]
    fn write_region_skips_padding_and_out_of_map_cells() {
        let mut map = Heightmap::new(3, 3);
        let padded = Heightmap::from_fn(4, 4, |x, y| (x + 10 * y) as f32);
        map.write_region(&Region::new(2, 1, 2, 2), 1, &padded);

        assert_eq!(map.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(map.row(1), &[0.0, 0.0, 11.0]);
        assert_eq!(map.row(2), &[0.0, 0.0, 21.0]);
    }

    #[test]
    fn grayscale_uses_given_range() {
        let map = Heightmap::from_fn(3, 1, |x, _| x as f32);
        assert_eq!(map.to_grayscale_image(0.0, 2.0), vec![0, 127, 255]);
    }

    #[test]
    fn flat_map_does_not_divide_by_zero() {
        let map = Heightmap::filled(2, 2, 5.0);
        let (min_h, max_h) = map.range().unwrap();
        assert_eq!(map.to_grayscale_image(min_h, max_h), vec![0; 4]);
    }

    #[test]
    fn base_terrain_is_deterministic_and_bounded() {
        let terrain = TerrainSettings::default();
        let a = generate_base_terrain(7, 16, 8, &terrain);
        let b = generate_base_terrain(7, 16, 8, &terrain);
        assert_eq!(a, b);
        assert!(
            a.data
                .iter()
                .all(|&h| (0.0..=terrain.amplitude).contains(&h))
        );
    }
}
