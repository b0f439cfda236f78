//! Génération du plan de déplacements
//!
//! Le planificateur principal conserve le « squelette » : la plus longue
//! sous-séquence d'éléments déjà dans le bon ordre relatif (LIS). Ces éléments
//! ne bougent jamais ; chacun des autres est déplacé exactement une fois, en
//! parcourant l'ordre cible du début à la fin et en le plaçant juste après
//! son prédécesseur cible.
//!
//! Un plan est strictement séquentiel : la référence `after` de l'opération
//! *k* est résolue sur l'état obtenu après les opérations `1..k-1`.

use crate::order::Order;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Déplacer l'élément `id` juste après `after` (ou en tête si None)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub id: String,
    pub after: Option<String>,
}

impl MoveOperation {
    pub fn to_front(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            after: None,
        }
    }

    pub fn after(id: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            after: Some(after.into()),
        }
    }
}

impl fmt::Display for MoveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.after {
            Some(after) => write!(f, "move {} after {}", self.id, after),
            None => write!(f, "move {} to front", self.id),
        }
    }
}

/// Plan de déplacements, à appliquer dans l'ordre
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    operations: Vec<MoveOperation>,
    /// Éléments qui restent en place, dans l'ordre courant
    skeleton: Vec<String>,
}

impl MovePlan {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MoveOperation> {
        self.operations.iter()
    }

    pub fn operations(&self) -> &[MoveOperation] {
        &self.operations
    }

    pub fn skeleton(&self) -> &[String] {
        &self.skeleton
    }
}

impl<'a> IntoIterator for &'a MovePlan {
    type Item = &'a MoveOperation;
    type IntoIter = std::slice::Iter<'a, MoveOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Stratégie de planification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStrategy {
    /// Nombre minimal de déplacements (squelette LIS)
    #[default]
    Skeleton,
    /// Parcours gauche-droite sans squelette, jusqu'à n-1 déplacements
    Naive,
}

impl PlanStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStrategy::Skeleton => "skeleton",
            PlanStrategy::Naive => "naive",
        }
    }
}

impl fmt::Display for PlanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skeleton" | "minimal" | "lis" => Ok(PlanStrategy::Skeleton),
            "naive" | "simple" => Ok(PlanStrategy::Naive),
            other => Err(Error::Configuration(format!(
                "Unknown plan strategy: {}",
                other
            ))),
        }
    }
}

/// Calcule le plan avec la stratégie demandée
pub fn plan_moves<S, T>(current: &[S], desired: &[T], strategy: PlanStrategy) -> Result<MovePlan>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    match strategy {
        PlanStrategy::Skeleton => plan_minimal_moves(current, desired),
        PlanStrategy::Naive => plan_naive_moves(current, desired),
    }
}

/// Plan minimal : seuls les éléments hors squelette sont déplacés
///
/// `current` et `desired` doivent être des permutations du même ensemble
/// d'identifiants, sinon [`Error::DivergentOrders`] est renvoyée.
pub fn plan_minimal_moves<S, T>(current: &[S], desired: &[T]) -> Result<MovePlan>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    check_permutation(current, desired)?;

    let desired_index: HashMap<&str, usize> = desired
        .iter()
        .enumerate()
        .map(|(rank, id)| (id.as_ref(), rank))
        .collect();

    let ranks: Vec<usize> = current
        .iter()
        .map(|id| desired_index[id.as_ref()])
        .collect();

    let skeleton: Vec<String> = longest_increasing_subsequence(&ranks)
        .into_iter()
        .map(|i| current[i].as_ref().to_string())
        .collect();
    let fixed: HashSet<&str> = skeleton.iter().map(String::as_str).collect();

    let mut working = Order::from_ids(current.iter().map(|id| id.as_ref()))?;
    let mut operations = Vec::with_capacity(current.len() - skeleton.len());

    for (rank, id) in desired.iter().enumerate() {
        let id = id.as_ref();
        if fixed.contains(id) {
            continue;
        }
        let after = rank.checked_sub(1).map(|prev| desired[prev].as_ref());
        let op = MoveOperation {
            id: id.to_string(),
            after: after.map(str::to_string),
        };
        working.apply(&op)?;
        operations.push(op);
    }

    debug_assert_eq!(working.ids(), as_strings(desired));
    debug!(
        items = current.len(),
        skeleton = skeleton.len(),
        moves = operations.len(),
        "Computed minimal move plan"
    );

    Ok(MovePlan {
        operations,
        skeleton,
    })
}

/// Plan simple : déplace tout élément qui n'est pas à sa place en parcourant
/// l'ordre cible de gauche à droite
pub fn plan_naive_moves<S, T>(current: &[S], desired: &[T]) -> Result<MovePlan>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    check_permutation(current, desired)?;

    let mut working = Order::from_ids(current.iter().map(|id| id.as_ref()))?;
    let mut operations = Vec::new();

    for (rank, id) in desired.iter().enumerate() {
        let id = id.as_ref();
        if working.position_of(id) == Some(rank) {
            continue;
        }
        let op = MoveOperation {
            id: id.to_string(),
            after: rank.checked_sub(1).map(|prev| desired[prev].as_ref().to_string()),
        };
        working.apply(&op)?;
        operations.push(op);
    }

    let moved: HashSet<&str> = operations.iter().map(|op| op.id.as_str()).collect();
    let skeleton = current
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| !moved.contains(id))
        .map(str::to_string)
        .collect();

    debug!(
        items = current.len(),
        moves = operations.len(),
        "Computed naive move plan"
    );

    Ok(MovePlan {
        operations,
        skeleton,
    })
}

/// Indices d'une plus longue sous-séquence strictement croissante
///
/// Tri par patience en O(n log n) : `tails[k]` est l'indice de la plus petite
/// fin connue d'une sous-séquence de longueur `k + 1`.
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let pile = tails.partition_point(|&t| values[t] < value);
        previous[i] = pile.checked_sub(1).map(|p| tails[p]);
        if pile == tails.len() {
            tails.push(i);
        } else {
            tails[pile] = i;
        }
    }

    let mut sequence = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        sequence.push(i);
        cursor = previous[i];
    }
    sequence.reverse();
    sequence
}

fn check_permutation<S, T>(current: &[S], desired: &[T]) -> Result<()>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let current_set = unique_set(current)?;
    let desired_set = unique_set(desired)?;

    if current_set == desired_set {
        return Ok(());
    }

    let only_in_current = current
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| !desired_set.contains(id))
        .map(str::to_string)
        .collect();
    let only_in_desired = desired
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| !current_set.contains(id))
        .map(str::to_string)
        .collect();

    Err(Error::DivergentOrders {
        only_in_current,
        only_in_desired,
    })
}

fn unique_set<S: AsRef<str>>(ids: &[S]) -> Result<HashSet<&str>> {
    let mut set = HashSet::with_capacity(ids.len());
    for id in ids {
        if !set.insert(id.as_ref()) {
            return Err(Error::DuplicateId(id.as_ref().to_string()));
        }
    }
    Ok(set)
}

fn as_strings<T: AsRef<str>>(ids: &[T]) -> Vec<String> {
    ids.iter().map(|id| id.as_ref().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_all(current: &[&str], plan: &MovePlan) -> Vec<String> {
        let mut order = Order::from_ids(current.iter().copied()).unwrap();
        for op in plan {
            order.apply(op).unwrap();
        }
        order.ids()
    }

    #[test]
    fn test_lis_basic() {
        assert_eq!(longest_increasing_subsequence(&[3, 0, 1, 2]), vec![1, 2, 3]);
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[2, 1, 0]).len(), 1);
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2, 3]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_lis_is_strictly_increasing() {
        let values = [5, 1, 6, 2, 7, 3, 8, 4, 0];
        let lis = longest_increasing_subsequence(&values);
        assert_eq!(lis.len(), 4);
        for pair in lis.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(values[pair[0]] < values[pair[1]]);
        }
    }

    #[test]
    fn test_single_item_moved_to_end() {
        let current = ["D", "A", "B", "C"];
        let desired = ["A", "B", "C", "D"];
        let plan = plan_minimal_moves(&current, &desired).unwrap();

        assert_eq!(plan.skeleton(), &["A", "B", "C"]);
        assert_eq!(plan.operations(), &[MoveOperation::after("D", "C")]);
        assert_eq!(apply_all(&current, &plan), desired);
    }

    #[test]
    fn test_already_sorted_gives_empty_plan() {
        let ids = ["A", "B", "C", "D"];
        let plan = plan_minimal_moves(&ids, &ids).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.skeleton().len(), 4);
    }

    #[test]
    fn test_move_to_front() {
        let current = ["B", "C", "A"];
        let desired = ["A", "B", "C"];
        let plan = plan_minimal_moves(&current, &desired).unwrap();
        assert_eq!(plan.operations(), &[MoveOperation::to_front("A")]);
    }

    #[test]
    fn test_reversed_needs_n_minus_one_moves() {
        let current = ["E", "D", "C", "B", "A"];
        let desired = ["A", "B", "C", "D", "E"];
        let plan = plan_minimal_moves(&current, &desired).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(apply_all(&current, &plan), desired);
    }

    #[test]
    fn test_empty_orders() {
        let empty: [&str; 0] = [];
        assert!(plan_minimal_moves(&empty, &empty).unwrap().is_empty());
        assert!(plan_naive_moves(&empty, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_divergent_sets_are_rejected() {
        let err = plan_minimal_moves(&["A", "B", "C"], &["A", "B", "X"]).unwrap_err();
        match err {
            Error::DivergentOrders {
                only_in_current,
                only_in_desired,
            } => {
                assert_eq!(only_in_current, vec!["C"]);
                assert_eq!(only_in_desired, vec!["X"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            plan_minimal_moves(&["A", "B"], &["A", "B", "C"]),
            Err(Error::DivergentOrders { .. })
        ));
    }

    #[test]
    fn test_duplicates_are_rejected() {
        assert!(matches!(
            plan_minimal_moves(&["A", "A"], &["A", "A"]),
            Err(Error::DuplicateId(_))
        ));
        assert!(matches!(
            plan_naive_moves(&["A", "B"], &["B", "B"]),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn test_naive_plan_is_correct_but_not_minimal() {
        let current = ["D", "A", "B", "C"];
        let desired = ["A", "B", "C", "D"];
        let plan = plan_naive_moves(&current, &desired).unwrap();
        assert_eq!(apply_all(&current, &plan), desired);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("skeleton".parse::<PlanStrategy>().unwrap(), PlanStrategy::Skeleton);
        assert_eq!("NAIVE".parse::<PlanStrategy>().unwrap(), PlanStrategy::Naive);
        assert!("bogus".parse::<PlanStrategy>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MoveOperation::after("D", "C").to_string(), "move D after C");
        assert_eq!(MoveOperation::to_front("A").to_string(), "move A to front");
    }
}
