use crate::domain::{AlternativeIdentifiers, RawTerm, SPECIAL_REPORT_TYPE, SpecialReport};
use crate::identity::{external_id_for_tme_identifier, tme_identifier};

pub fn transform_special_report(term: &RawTerm, taxonomy_name: &str) -> SpecialReport {
    let tme_id = tme_identifier(&term.raw_id, taxonomy_name);
    let uuid = external_id_for_tme_identifier(&tme_id).into_string();

    SpecialReport {
        alternative_identifiers: AlternativeIdentifiers {
            tme: vec![tme_id],
            uuids: vec![uuid.clone()],
        },
        uuid,
        pref_label: term.canonical_name.clone(),
        kind: SPECIAL_REPORT_TYPE.to_string(),
    }
}
