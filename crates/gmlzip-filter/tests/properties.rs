use std::collections::BTreeSet;

use gmlzip_filter::{RecordMarkers, Selector, filter_records};
use proptest::prelude::*;

fn record(id: &str, single_line: bool) -> String {
    if single_line {
        format!("<core:cityObjectMember><bldg:Building gml:id=\"{id}\"/></core:cityObjectMember>\n")
    } else {
        format!(
            "<core:cityObjectMember>\n  <bldg:Building gml:id=\"{id}\">\n  </bldg:Building>\n</core:cityObjectMember>\n"
        )
    }
}

fn filler() -> impl Strategy<Value = String> {
    prop::collection::vec("[ a-zA-Z0-9=\"<>/]{0,24}", 0..3).prop_map(|lines| {
        lines
            .into_iter()
            .filter(|l| !l.contains("cityObjectMember"))
            .map(|l| format!("{l}\n"))
            .collect()
    })
}

prop_compose! {
    fn document()(
        records in prop::collection::vec(("id-[0-9]{1,2}", any::<bool>(), filler()), 0..12),
        keep in prop::collection::btree_set("id-[0-9]{1,2}", 0..8),
    ) -> (Vec<(String, bool, String)>, BTreeSet<String>) {
        (records, keep)
    }
}

proptest! {
    #[test]
    fn subset_keeps_selected_records_in_order((records, keep) in document()) {
        let markers = RecordMarkers::default().compile().unwrap();

        let mut input = String::from("<core:CityModel>\n");
        let mut expected = input.clone();
        let mut expected_ids = BTreeSet::new();
        for (id, single_line, between) in &records {
            let text = record(id, *single_line);
            input.push_str(&text);
            input.push_str(between);
            if keep.contains(id) {
                expected.push_str(&text);
                expected_ids.insert(id.clone());
            }
            expected.push_str(between);
        }
        input.push_str("</core:CityModel>\n");
        expected.push_str("</core:CityModel>\n");

        let selector = Selector::ByIds(keep.clone());
        let mut output = Vec::new();
        let outcome = filter_records(input.as_bytes(), &mut output, &markers, &selector).unwrap();

        prop_assert_eq!(String::from_utf8(output.clone()).unwrap(), expected);
        prop_assert_eq!(&outcome.matched, &expected_ids);
        prop_assert_eq!(outcome.kept + outcome.dropped, records.len());

        let mut again = Vec::new();
        let rerun = filter_records(output.as_slice(), &mut again, &markers, &selector).unwrap();
        prop_assert_eq!(again, output);
        prop_assert_eq!(rerun.matched, outcome.matched);
    }

    #[test]
    fn all_selector_is_identity((records, _) in document()) {
        let markers = RecordMarkers::default().compile().unwrap();
        let mut input = String::new();
        for (id, single_line, between) in &records {
            input.push_str(&record(id, *single_line));
            input.push_str(between);
        }

        let mut output = Vec::new();
        let outcome = filter_records(input.as_bytes(), &mut output, &markers, &Selector::All).unwrap();
        prop_assert_eq!(output, input.into_bytes());
        prop_assert_eq!(outcome.dropped, 0);
    }
}
