//! ウォッチポイント管理
//!
//! 固定数のスロットを持つプールで、未使用スロットのフリーリストと
//! 使用中スロットのアクティブリストを管理します。
//! ウォッチポイントの作成・削除はメモリ確保を伴わず、リストの付け替えだけを行います。

use crate::errors::{EvalError, WatchError};
use tracing::{debug, error, info};

/// ウォッチポイントの最大数
pub const NR_WATCHPOINTS: usize = 32;

/// ウォッチ式の最大長（文字数）
pub const MAX_EXPRESSION_LEN: usize = 255;

/// ウォッチポイントID（スロット番号）
pub type WatchpointId = usize;

/// 値の変化を検出したウォッチポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHit {
    pub id: WatchpointId,
    pub expression: String,
    pub old_value: u64,
    pub new_value: u64,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    expression: String,
    last_value: u64,
    active: bool,
    /// アクティブリスト上の前後のスロット
    prev: Option<WatchpointId>,
    next: Option<WatchpointId>,
}

/// ウォッチポイントプール
///
/// アクティブリストは新しく作成したものが先頭に来ます。
/// フリーリストは後入れ先出しで、削除したスロットが次の作成で再利用されます。
pub struct WatchpointPool {
    slots: Vec<Slot>,
    /// 末尾がフリーリストの先頭
    free: Vec<WatchpointId>,
    head: Option<WatchpointId>,
}

impl WatchpointPool {
    /// 初期化済みのプールを作成する
    pub fn new() -> Self {
        let mut pool = Self {
            slots: vec![Slot::default(); NR_WATCHPOINTS],
            free: Vec::with_capacity(NR_WATCHPOINTS),
            head: None,
        };
        pool.init();
        pool
    }

    /// すべてのスロットを未使用に戻す
    ///
    /// フリーリストはスロット番号の昇順で取り出される順序になります。
    pub fn init(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
        self.free.clear();
        self.free.extend((0..NR_WATCHPOINTS).rev());
        self.head = None;
    }

    /// ウォッチポイントを作成し、アクティブリストの先頭に追加する
    pub fn create(&mut self, expression: &str, initial_value: u64) -> Result<WatchpointId, WatchError> {
        if self.free.is_empty() {
            return Err(WatchError::PoolExhausted {
                capacity: NR_WATCHPOINTS,
            });
        }
        let len = expression.chars().count();
        if len > MAX_EXPRESSION_LEN {
            return Err(WatchError::ExpressionTooLong {
                len,
                max: MAX_EXPRESSION_LEN,
            });
        }

        let id = self.free.pop().ok_or(WatchError::PoolExhausted {
            capacity: NR_WATCHPOINTS,
        })?;

        let old_head = self.head;
        let slot = &mut self.slots[id];
        slot.expression = expression.to_string();
        slot.last_value = initial_value;
        slot.active = true;
        slot.prev = None;
        slot.next = old_head;

        if let Some(old_head) = old_head {
            self.slots[old_head].prev = Some(id);
        }
        self.head = Some(id);

        debug!("watchpoint {} created: {} = 0x{:x}", id, expression, initial_value);
        Ok(id)
    }

    /// ウォッチポイントを削除し、スロットをフリーリストに戻す
    pub fn delete(&mut self, id: WatchpointId) -> Result<(), WatchError> {
        if !self.is_active(id) {
            return Err(WatchError::NotFound { id });
        }

        let (prev, next) = (self.slots[id].prev, self.slots[id].next);
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        if let Some(next) = next {
            self.slots[next].prev = prev;
        }

        self.slots[id] = Slot::default();
        self.free.push(id);

        debug!("watchpoint {} deleted", id);
        Ok(())
    }

    /// 使用中のウォッチポイントか
    pub fn is_active(&self, id: WatchpointId) -> bool {
        self.slots.get(id).is_some_and(|slot| slot.active)
    }

    /// アクティブなウォッチポイントを (ID, 式) で列挙する（新しい順）
    pub fn list(&self) -> Iter<'_> {
        Iter {
            pool: self,
            cursor: self.head,
        }
    }

    /// 最後に観測した値を取得する
    pub fn last_value(&self, id: WatchpointId) -> Option<u64> {
        self.is_active(id).then(|| self.slots[id].last_value)
    }

    /// アクティブなウォッチポイントの数
    pub fn len(&self) -> usize {
        NR_WATCHPOINTS - self.free.len()
    }

    /// アクティブなウォッチポイントがないか
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// すべてのアクティブなウォッチポイントを再評価する
    ///
    /// 値が変化したものを返し、記録している値を更新します。
    /// 変化を検出しても残りのウォッチポイントの検査は続けます。
    /// 作成時に評価できた式が評価できなくなった場合はエラーを返し、
    /// 記録している値はどれも更新しません。
    pub fn check_all<F>(&mut self, mut evaluate: F) -> Result<Vec<WatchHit>, WatchError>
    where
        F: FnMut(&str) -> Result<u64, EvalError>,
    {
        let mut hits = Vec::new();
        let mut cursor = self.head;

        while let Some(id) = cursor {
            let slot = &self.slots[id];
            cursor = slot.next;

            let new_value = evaluate(&slot.expression).map_err(|source| {
                error!("watchpoint {} ({}) failed to re-evaluate: {}", id, slot.expression, source);
                WatchError::Reevaluation {
                    id,
                    expression: slot.expression.clone(),
                    source,
                }
            })?;

            if new_value != slot.last_value {
                info!(
                    "watchpoint {}: {} changed 0x{:x} -> 0x{:x}",
                    id, slot.expression, slot.last_value, new_value
                );
                hits.push(WatchHit {
                    id,
                    expression: slot.expression.clone(),
                    old_value: slot.last_value,
                    new_value,
                });
            }
        }

        for hit in &hits {
            self.slots[hit.id].last_value = hit.new_value;
        }

        Ok(hits)
    }
}

impl Default for WatchpointPool {
    fn default() -> Self {
        Self::new()
    }
}

/// アクティブリストを辿るイテレータ
pub struct Iter<'a> {
    pool: &'a WatchpointPool,
    cursor: Option<WatchpointId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (WatchpointId, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let slot = &self.pool.slots[id];
        self.cursor = slot.next;
        Some((id, slot.expression.as_str()))
    }
}
