//! Discriminant election for object unions.
//!
//! A field qualifies when it (i) is present in every member, (ii) is a
//! single literal in each member, and (iii) has pairwise-distinct values.
//! Candidates are tried in the declaration order of the *first* member, so
//! ties resolve deterministically.

use tsgonest_metadata::model::{Discriminant, Literal, Metadata};
use tsgonest_metadata::registry::{ObjectId, ObjectRegistry};

/// Try to elect a discriminant for a union over `members` (in union
/// declaration order). Returns `None` when no field qualifies.
#[must_use]
pub fn elect_discriminant(registry: &ObjectRegistry, members: &[ObjectId]) -> Option<Discriminant> {
    if members.len() < 2 {
        return None;
    }
    let first = registry.get(members[0]);
    for candidate in &first.properties {
        if let Some(mapping) = qualify(registry, members, &candidate.name) {
            return Some(Discriminant {
                field: candidate.name.clone(),
                mapping,
            });
        }
    }
    None
}

fn qualify(
    registry: &ObjectRegistry,
    members: &[ObjectId],
    field: &str,
) -> Option<Vec<(Literal, ObjectId)>> {
    let mut mapping: Vec<(Literal, ObjectId)> = Vec::with_capacity(members.len());
    for &member in members {
        let record = registry.get(member);
        let property = record.properties.iter().find(|p| p.name == field)?;
        let value = single_literal(&property.value)?;
        if mapping.iter().any(|(existing, _)| *existing == value) {
            // two members share this tag value; the field cannot select
            return None;
        }
        mapping.push((value, member));
    }
    Some(mapping)
}

/// The property must be exactly one literal alternative, nothing else.
fn single_literal(meta: &Metadata) -> Option<Literal> {
    if meta.alternative_count() != 1 || meta.nullable {
        return None;
    }
    let group = meta.constants.first()?;
    if group.values.len() != 1 {
        return None;
    }
    group.values.first().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsgonest_metadata::model::Atomic;
    use tsgonest_metadata::registry::Property;

    fn tagged(registry: &mut ObjectRegistry, name: &str, tag: &str) -> ObjectId {
        let id = registry.insert_placeholder(name, "payment.dto.ts");
        let mut value = Metadata::new();
        value.add_constant(Literal::String(tag.to_string()));
        registry.get_mut(id).properties = vec![
            Property {
                name: "type".to_string(),
                value,
                readonly: false,
                optional: false,
                doc: None,
            },
            Property {
                name: "amount".to_string(),
                value: Metadata::atomic(Atomic::Number),
                readonly: false,
                optional: false,
                doc: None,
            },
        ];
        id
    }

    #[test]
    fn elects_literal_tag_field() {
        let mut registry = ObjectRegistry::default();
        let card = tagged(&mut registry, "CardPayment", "card");
        let bank = tagged(&mut registry, "BankPayment", "bank");
        let crypto = tagged(&mut registry, "CryptoPayment", "crypto");

        let elected = elect_discriminant(&registry, &[card, bank, crypto]).unwrap();
        assert_eq!(elected.field, "type");
        assert_eq!(elected.mapping.len(), 3);
        assert_eq!(elected.mapping[0].1, card);
    }

    #[test]
    fn duplicate_tag_values_disqualify_the_field() {
        let mut registry = ObjectRegistry::default();
        let a = tagged(&mut registry, "A", "same");
        let b = tagged(&mut registry, "B", "same");
        let c = tagged(&mut registry, "C", "other");
        assert_eq!(elect_discriminant(&registry, &[a, b, c]), None);
    }

    #[test]
    fn field_missing_in_one_member_disqualifies() {
        let mut registry = ObjectRegistry::default();
        let a = tagged(&mut registry, "A", "a");
        let plain = registry.insert_placeholder("Plain", "p.ts");
        registry.get_mut(plain).properties = vec![Property {
            name: "amount".to_string(),
            value: Metadata::atomic(Atomic::Number),
            readonly: false,
            optional: false,
            doc: None,
        }];
        assert_eq!(elect_discriminant(&registry, &[a, plain]), None);
    }

    #[test]
    fn non_literal_field_disqualifies() {
        let mut registry = ObjectRegistry::default();
        let a = tagged(&mut registry, "A", "a");
        let b = registry.insert_placeholder("B", "b.ts");
        registry.get_mut(b).properties = vec![Property {
            name: "type".to_string(),
            value: Metadata::atomic(Atomic::String),
            readonly: false,
            optional: false,
            doc: None,
        }];
        assert_eq!(elect_discriminant(&registry, &[a, b]), None);
    }

    #[test]
    fn single_member_has_no_discriminant() {
        let mut registry = ObjectRegistry::default();
        let a = tagged(&mut registry, "A", "a");
        assert_eq!(elect_discriminant(&registry, &[a]), None);
    }
}
