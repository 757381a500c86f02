// src/config.rs
//! Конфигурация инструмента Mould
//!
//! Этот модуль определяет параметры, управляющие сглаживанием:
//! - Настройки самого инструмента (смещение рейкаста, радиус, число потоков)
//! - Параметры демонстрационного задания для CLI (рельеф, плато, случайные фиксированные клетки)
//!
//! Все структуры поддерживают сериализацию в TOML для удобной настройки через конфигурационные файлы.

use crate::error::MouldResult;
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Настройки инструмента Mould
///
/// Читаются один раз при создании `MouldBlur`; во время сглаживания не меняются.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MouldSettings {
    /// Смещение, вычитаемое из высоты попадания рейкаста перед фиксацией клетки
    #[serde(default = "default_raycast_offset")]
    pub mould_raycast_offset: f32,

    /// Радиус сглаживания в клетках (0 = только фиксация)
    #[serde(default = "default_smooth_radius")]
    pub smooth_radius: usize,

    /// Число рабочих потоков:
    /// - `None` — столько, сколько сообщает `available_parallelism`,
    /// - `Some(n)` — ровно `n` (минимум 1).
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_raycast_offset() -> f32 {
    0.0
}
fn default_smooth_radius() -> usize {
    2
}

impl Default for MouldSettings {
    fn default() -> Self {
        Self {
            mould_raycast_offset: 0.0,
            smooth_radius: 2,
            threads: None,
        }
    }
}

/// Параметры базового рельефа для демонстрации
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainSettings {
    /// Частота шума (меньше = крупнее формы)
    #[serde(default = "default_frequency")]
    pub frequency: f32,

    #[serde(default = "default_octaves")]
    pub octaves: i32,

    /// Максимальная высота рельефа
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
}

fn default_frequency() -> f32 {
    0.02
}
fn default_octaves() -> i32 {
    4
}
fn default_amplitude() -> f32 {
    1.0
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            frequency: 0.02,
            octaves: 4,
            amplitude: 1.0,
        }
    }
}

/// Плато — прямоугольник «попаданий рейкаста» на одной высоте
///
/// Координаты задаются относительно области (без отступа).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlateauSettings {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Высота попадания до вычитания `mould_raycast_offset`
    pub hit_height: f32,
}

/// Случайно разбросанные фиксированные клетки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScatterSettings {
    pub count: usize,
    /// Высоты попаданий равномерно берутся из `[min_height, max_height)`
    #[serde(default = "default_scatter_min")]
    pub min_height: f32,
    #[serde(default = "default_scatter_max")]
    pub max_height: f32,
}

fn default_scatter_min() -> f32 {
    0.0
}
fn default_scatter_max() -> f32 {
    1.0
}

/// Полное задание для `mould-cli`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouldJobParams {
    /// Сид генератора (детерминированный рельеф и разброс)
    #[serde(default)]
    pub seed: u64,

    /// Ширина всей карты в клетках (по умолчанию 256)
    #[serde(default = "default_map_size")]
    pub width: usize,

    /// Высота всей карты в клетках (по умолчанию 256)
    #[serde(default = "default_map_size")]
    pub height: usize,

    /// Редактируемая область внутри карты
    pub region: Region,

    #[serde(default)]
    pub settings: MouldSettings,

    #[serde(default)]
    pub terrain: TerrainSettings,

    #[serde(default)]
    pub plateau: Option<PlateauSettings>,

    #[serde(default)]
    pub scatter: Option<ScatterSettings>,
}

fn default_map_size() -> usize {
    256
}

impl MouldJobParams {
    /// Загружает задание из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # mould.toml
    /// seed = 42
    ///
    /// [region]
    /// x = 100
    /// y = 80
    /// width = 64
    /// height = 48
    ///
    /// [settings]
    /// mould_raycast_offset = 0.05
    /// smooth_radius = 3
    ///
    /// [plateau]
    /// x = 16
    /// y = 12
    /// width = 20
    /// height = 10
    /// hit_height = 0.8
    /// ```
    pub fn from_toml_file(path: &Path) -> MouldResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> MouldResult<Self> {
        let params: Self = toml::from_str(contents)?;
        Ok(params)
    }
}
