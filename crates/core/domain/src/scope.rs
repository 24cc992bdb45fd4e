use std::collections::BTreeSet;
use std::fmt;

/// 楼层范围：整栋所有楼层或指定单层。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorScope {
    AllFloors,
    Floor(i32),
}

impl FloorScope {
    /// 从可选楼层构造（`None` 表示整栋）。
    pub fn from_optional(floor: Option<i32>) -> Self {
        match floor {
            Some(level) => FloorScope::Floor(level),
            None => FloorScope::AllFloors,
        }
    }

    pub fn as_optional(self) -> Option<i32> {
        match self {
            FloorScope::AllFloors => None,
            FloorScope::Floor(level) => Some(level),
        }
    }

    /// 单元所在楼层是否落在本范围内。
    pub fn matches(self, unit_floor: Option<i32>) -> bool {
        match self {
            FloorScope::AllFloors => true,
            FloorScope::Floor(level) => unit_floor == Some(level),
        }
    }
}

impl fmt::Display for FloorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloorScope::AllFloors => write!(f, "all floors"),
            FloorScope::Floor(level) => write!(f, "floor {level}"),
        }
    }
}

/// 单元范围：范围片内全部单元或指定单元集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitScope {
    AllUnits,
    Units(BTreeSet<String>),
}

impl UnitScope {
    /// 从单元 ID 列表构造；空列表归一化为全部单元。
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let set: BTreeSet<String> = ids.into_iter().collect();
        if set.is_empty() {
            UnitScope::AllUnits
        } else {
            UnitScope::Units(set)
        }
    }

    /// 从存储层的可选列表构造（`None` 与空列表等价）。
    pub fn from_optional(ids: Option<Vec<String>>) -> Self {
        Self::from_ids(ids.unwrap_or_default())
    }

    pub fn covers_all(&self) -> bool {
        matches!(self, UnitScope::AllUnits)
    }

    /// 单元是否落在本范围内。
    pub fn contains(&self, unit_id: &str) -> bool {
        match self {
            UnitScope::AllUnits => true,
            UnitScope::Units(ids) => ids.contains(unit_id),
        }
    }
}

impl fmt::Display for UnitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitScope::AllUnits => write!(f, "all units"),
            UnitScope::Units(ids) => {
                let joined: Vec<&str> = ids.iter().map(String::as_str).collect();
                write!(f, "units {}", joined.join(", "))
            }
        }
    }
}

fn floors_overlap(a: FloorScope, b: FloorScope) -> bool {
    match (a, b) {
        (FloorScope::AllFloors, _) | (_, FloorScope::AllFloors) => true,
        (FloorScope::Floor(x), FloorScope::Floor(y)) => x == y,
    }
}

/// 判定两个任务范围是否相交。
///
/// 任一侧覆盖全部单元时退化为楼层判定（整栋为通配），
/// 否则按单元集合求交。
pub fn scopes_intersect(
    floor_a: FloorScope,
    units_a: &UnitScope,
    floor_b: FloorScope,
    units_b: &UnitScope,
) -> bool {
    match (units_a, units_b) {
        (UnitScope::AllUnits, _) | (_, UnitScope::AllUnits) => floors_overlap(floor_a, floor_b),
        (UnitScope::Units(a), UnitScope::Units(b)) => a.intersection(b).next().is_some(),
    }
}
