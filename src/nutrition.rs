//! 予測ラベルから栄養テーブルの行を引く

use crate::csv_loader::NutritionTable;
use crate::types::NutritionRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 果物名の照合方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// 大文字小文字を区別しない部分一致
    ///
    /// 表記ゆれには強いが、ある果物名が別の果物名の一部になっている場合
    /// （例: "Apple" と "Pineapple"）は先に現れた行が選ばれる。
    #[default]
    Substring,
    /// 大文字小文字を区別しない完全一致
    Exact,
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPolicy::Substring => write!(f, "substring"),
            MatchPolicy::Exact => write!(f, "exact"),
        }
    }
}

/// テーブルの表記に合わせてラベルを正規化する（小文字化して先頭のみ大文字）
pub fn normalize_label(label: &str) -> String {
    let lower = label.trim().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// ラベル → 栄養テーブル行の解決
#[derive(Debug, Clone, Default)]
pub struct NutritionResolver {
    policy: MatchPolicy,
    /// ラベル（小文字）→ テーブル上の果物名
    aliases: HashMap<String, String>,
}

impl NutritionResolver {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            aliases: HashMap::new(),
        }
    }

    /// 別名テーブルを設定
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases
            .into_iter()
            .map(|(label, name)| (label.trim().to_lowercase(), name))
            .collect();
        self
    }

    /// 予測ラベルに対応する最初の行を返す。見つからなければ None
    ///
    /// 部分一致では空のラベルは果物名を持つ最初の行に一致する。
    pub fn resolve<'a>(&self, table: &'a NutritionTable, label: &str) -> Option<&'a NutritionRow> {
        let key = label.trim().to_lowercase();
        let query = match self.aliases.get(&key) {
            Some(alias) => normalize_label(alias),
            None => normalize_label(label),
        };
        if query.is_empty() && self.policy == MatchPolicy::Exact {
            return None;
        }

        let needle = query.to_lowercase();
        let found = table.rows().iter().find(|row| match row.fruit() {
            Some(name) => {
                let name = name.trim().to_lowercase();
                match self.policy {
                    MatchPolicy::Substring => name.contains(&needle),
                    MatchPolicy::Exact => name == needle,
                }
            }
            None => false,
        });

        tracing::debug!(
            "栄養情報検索: label={} query={} policy={} found={}",
            label,
            query,
            self.policy,
            found.is_some()
        );
        found
    }

    /// テーブルに対応する行が無いラベルを列挙する
    pub fn unmatched_labels<'l, S: AsRef<str>>(
        &self,
        table: &NutritionTable,
        labels: &'l [S],
    ) -> Vec<&'l str> {
        labels
            .iter()
            .map(|l| l.as_ref())
            .filter(|l| self.resolve(table, l).is_none())
            .collect()
    }
}
