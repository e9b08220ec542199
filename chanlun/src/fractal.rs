//! 分型检测。
//!
//! 每根新的合并 K 线到来时检查以它为右侧的三根 K 线。
//! 分型一经记录即不删除，之后只会更新 `superseded`、`level` 和封存后的右侧 K 线。

use std::sync::Arc;

use crate::bar::{Fractal, MergedBar};
use crate::id_generator::IdGenerator;
use crate::level::Level;

#[derive(Debug, Clone, Default)]
pub struct FractalDetector {
    rows: Vec<Fractal>,
    id_generator: IdGenerator,
}

impl FractalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `history` 为 `current` 之前已封存的合并 K 线，不足两根时不检测。
    pub fn on_bar_appended(
        &mut self,
        history: &[Arc<MergedBar>],
        current: &MergedBar,
    ) -> Option<Fractal> {
        let [.., left, middle] = history else {
            return None;
        };
        if Fractal::verify(left, middle, current).is_none() {
            return None;
        }
        let id = self.id_generator.get_id();
        let fractal = Fractal::new(
            id,
            Arc::clone(left),
            Arc::clone(middle),
            Arc::new(current.clone()),
        )?;
        self.rows.push(fractal.clone());
        Some(fractal)
    }

    /// 右侧 K 线封存后，用最终形态替换最近分型里检测时的快照。
    pub fn refresh_right(&mut self, sealed: &Arc<MergedBar>) -> Option<Fractal> {
        let last = self.rows.last_mut()?;
        if last.right.id != sealed.id {
            return None;
        }
        last.right = Arc::clone(sealed);
        Some(last.clone())
    }

    pub fn set_level(&mut self, fractal_id: u64, level: Level) -> bool {
        match self.rows.binary_search_by_key(&fractal_id, |x| x.id) {
            Ok(index) => {
                self.rows[index].level = level;
                true
            }
            Err(_) => false,
        }
    }

    pub fn mark_superseded(&mut self, fractal_id: u64) -> bool {
        match self.rows.binary_search_by_key(&fractal_id, |x| x.id) {
            Ok(index) => {
                self.rows[index].superseded = true;
                true
            }
            Err(_) => false,
        }
    }

    pub fn rows(&self) -> &[Fractal] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Fractal> {
        self.rows.last()
    }

    pub fn between(&self, from_cbar_id: u64, to_cbar_id: u64) -> &[Fractal] {
        fractals_between(&self.rows, from_cbar_id, to_cbar_id)
    }

    /// 释放中间 K 线早于 `cbar_id` 的分型。
    pub fn retain_from(&mut self, cbar_id: u64) -> usize {
        let cut = self.rows.partition_point(|x| x.cbar_id() < cbar_id);
        self.rows.drain(..cut);
        cut
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `rows` 按中间 K 线排序，返回严格位于两个 id 之间的分型。
pub(crate) fn fractals_between(rows: &[Fractal], from_cbar_id: u64, to_cbar_id: u64) -> &[Fractal] {
    let lo = rows.partition_point(|x| x.cbar_id() <= from_cbar_id);
    let hi = rows.partition_point(|x| x.cbar_id() < to_cbar_id);
    if lo >= hi { &[] } else { &rows[lo..hi] }
}
