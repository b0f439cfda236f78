//! Ordre cible dérivé des horodatages

use crate::order::Order;

/// Ordre cible : meilleur horodatage disponible (enregistrement, sinon
/// publication), croissant
///
/// Le tri est stable : à horodatage égal, l'ordre courant est conservé.
/// Les éléments sans horodatage sont placés à la fin, dans leur ordre courant.
pub fn desired_order_by_timestamp(order: &Order) -> Vec<String> {
    let mut items: Vec<_> = order.items().iter().collect();
    items.sort_by_key(|item| match item.metadata.best_timestamp() {
        Some(at) => (false, Some(at)),
        None => (true, None),
    });
    items.into_iter().map(|item| item.id.clone()).collect()
}
