mod common;

use std::sync::{Arc, Mutex};

use common::{ab_master, array_master, bits, scenario_master};
use proptest::prelude::*;
use pvcopy::{
    intersect, parse_request, CopyConfig, CopyError, FilterContext, FilterField, PVCopy,
    PVFilter, ParseError, PluginRegistry,
};
use pvdata::{BitSet, PVStructure, PVValue};

fn child_names(pv: &PVStructure) -> Vec<String> {
    pv.field()
        .children()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

fn initialized(pv_copy: &PVCopy, master: &PVStructure) -> PVStructure {
    let mut copy = pv_copy.create_instance();
    let mut changed = BitSet::new();
    pv_copy.init(master, &mut copy, &mut changed).unwrap();
    copy
}

#[test]
fn copy_fields_follow_request_order() {
    common::init_tracing();
    let master = ab_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(b,a)", "field").unwrap();
    assert_eq!(child_names(pv_copy.copy_structure()), vec!["b", "a"]);

    let copy = initialized(&pv_copy, &master);
    assert_eq!(copy.get_i64("b"), Some(2));
    assert_eq!(copy.get_i64("a"), Some(1));
    assert_eq!(pv_copy.get_copy_offset(1), Some(2));
    assert_eq!(pv_copy.get_copy_offset(2), Some(1));
}

#[test]
fn empty_request_copies_everything() {
    let master = scenario_master();
    let request = parse_request("").unwrap();
    assert_eq!(intersect(master.field(), request.root()).as_ref(), Some(master.field()));

    let pv_copy = PVCopy::create(&master, &request, "field").unwrap();
    assert!(pv_copy.is_wildcard());
    assert_eq!(pv_copy.copy_structure().field(), master.field());
    assert_eq!(initialized(&pv_copy, &master), master);

    let record_only = PVCopy::create_from_str(&master, "record[process=false]", "field").unwrap();
    assert!(record_only.is_wildcard());
    assert_eq!(record_only.record_options().unwrap()["process"], "false");
}

#[test]
fn unknown_fields_are_dropped() {
    let master = ab_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(a,c)", "field").unwrap();
    assert_eq!(child_names(pv_copy.copy_structure()), vec!["a"]);
    assert_eq!(
        PVCopy::create_from_str(&master, "field(c,d{e})", "field").unwrap_err(),
        CopyError::NoFields
    );
}

#[test]
fn parse_errors_reject_the_copy() {
    let master = ab_master();
    let err = PVCopy::create_from_str(&master, "field(a", "field").unwrap_err();
    assert!(matches!(
        err,
        CopyError::Parse(ParseError::MissingClose { delimiter: ')', .. })
    ));
}

const SPECS: [&str; 7] = [
    "value",
    "alarm",
    "alarm.severity",
    "timeStamp{nsec}",
    "timeStamp.sec",
    "missing",
    "alarm{message,nothing}",
];

proptest! {
    #[test]
    fn init_matches_full_sync(
        picks in proptest::sample::subsequence(SPECS.to_vec(), 0..=SPECS.len())
    ) {
        let master = scenario_master();
        let text = format!("field({})", picks.join(","));
        let pv_copy = match PVCopy::create_from_str(&master, &text, "field") {
            Ok(pv_copy) => pv_copy,
            Err(CopyError::NoFields) => return Ok(()),
            Err(err) => panic!("{}: {}", text, err),
        };

        let mut by_init = pv_copy.create_instance();
        let mut init_bits = BitSet::new();
        init_bits.set(7);
        pv_copy.init(&master, &mut by_init, &mut init_bits).unwrap();
        prop_assert_eq!(bits(&init_bits), vec![0]);

        let mut by_sync = pv_copy.create_instance();
        let mut all = BitSet::new();
        all.set(0);
        pv_copy.update_copy_from_bitset(&master, &mut by_sync, &mut all).unwrap();
        prop_assert_eq!(&by_init, &by_sync);

        for offset in 1..by_init.number_fields() {
            let master_offset = pv_copy.get_master_offset(offset).unwrap();
            prop_assert_eq!(pv_copy.get_copy_offset(master_offset), Some(offset));
            if !by_init.entry(offset).unwrap().field().is_structure() {
                prop_assert!(by_init.subtree_equals(offset, &master, master_offset));
            }
        }
    }
}

struct CountingFilter {
    touched: Arc<Mutex<Vec<usize>>>,
}

impl PVFilter for CountingFilter {
    fn name(&self) -> &str {
        "count"
    }

    fn filter(&self, field: &mut FilterField<'_, '_>, _: &mut BitSet, _: bool) -> bool {
        self.touched.lock().unwrap().push(field.copy_offset());
        false
    }
}

fn counting_copy(master: &PVStructure, touched: &Arc<Mutex<Vec<usize>>>) -> PVCopy {
    let registry = PluginRegistry::new();
    let shared = Arc::clone(touched);
    registry.register("count", move |_: &str, _: &FilterContext<'_>| {
        Some(Box::new(CountingFilter {
            touched: Arc::clone(&shared),
        }) as Box<dyn PVFilter>)
    });
    let request = parse_request(
        "field(value[count=1],alarm{severity[count=1],message[count=1]},timeStamp[count=1])",
    )
    .unwrap();
    PVCopy::create_with(master, &request, "field", &CopyConfig::default(), &registry).unwrap()
}

#[test]
fn update_from_bitset_skips_clean_subtrees() {
    let mut master = scenario_master();
    let touched = Arc::new(Mutex::new(Vec::new()));
    let pv_copy = counting_copy(&master, &touched);
    // copy: value 1, alarm 2, severity 3, message 4, timeStamp 5, sec 6, nsec 7
    let mut copy = pv_copy.create_instance();

    let run = |master: &PVStructure, copy: &mut PVStructure, set: &[usize]| {
        touched.lock().unwrap().clear();
        let mut bitset: BitSet = set.iter().copied().collect();
        pv_copy
            .update_copy_from_bitset(master, copy, &mut bitset)
            .unwrap();
        touched.lock().unwrap().clone()
    };

    assert_eq!(run(&master, &mut copy, &[]), Vec::<usize>::new());
    assert_eq!(copy, pv_copy.create_instance());

    assert_eq!(run(&master, &mut copy, &[4]), vec![4]);
    assert_eq!(copy.get_str("alarm.message"), Some("HIGH"));
    assert_eq!(copy.get_i64("alarm.severity"), Some(0));

    assert_eq!(run(&master, &mut copy, &[6]), vec![5]);
    assert_eq!(copy.get_i64("timeStamp.sec"), Some(1_700_000_000));
    assert_eq!(copy.get_i64("timeStamp.nsec"), Some(0));
    assert_eq!(copy.get_f64("value"), Some(0.0));

    assert_eq!(run(&master, &mut copy, &[2]), vec![3, 4]);
    assert_eq!(copy.get_i64("alarm.severity"), Some(1));

    master.set_scalar("value", -1.0).unwrap();
    assert_eq!(run(&master, &mut copy, &[0]), vec![1, 3, 4, 5]);
    assert_eq!(copy.get_f64("value"), Some(-1.0));
    assert_eq!(copy.get_i64("timeStamp.nsec"), Some(250));
}

#[test]
fn structure_arrays_are_always_dirty() {
    let mut master = array_master();
    let mut element = master.new_element("history").unwrap();
    element.set_scalar("when", 42i64).unwrap();
    master
        .set("history", PVValue::StructureArray(vec![Arc::new(element)]))
        .unwrap();

    let pv_copy = PVCopy::create_from_str(&master, "field(history,alarm)", "field").unwrap();
    let mut copy = pv_copy.create_instance();
    let mut changed = BitSet::new();
    pv_copy.init(&master, &mut copy, &mut changed).unwrap();
    assert!(copy.subtree_equals(1, &master, 2));

    changed.clear_all();
    pv_copy
        .update_copy_set_bitset(&master, &mut copy, &mut changed)
        .unwrap();
    assert_eq!(bits(&changed), vec![1]);
}

#[test]
fn scenario_value_and_time_stamp() {
    let master = scenario_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(value,timeStamp)", "field").unwrap();
    assert_eq!(child_names(pv_copy.copy_structure()), vec!["value", "timeStamp"]);
    assert!(pv_copy.copy_structure().offset_of("alarm").is_none());

    let copy = initialized(&pv_copy, &master);
    assert_eq!(copy.get_f64("value"), master.get_f64("value"));
    assert_eq!(copy.get_i64("timeStamp.sec"), master.get_i64("timeStamp.sec"));
}

#[test]
fn scenario_changed_severity_sets_one_bit() {
    let mut master = scenario_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(alarm,value)", "field").unwrap();
    // copy: alarm 1, severity 2, message 3, value 4
    let mut copy = pv_copy.create_instance();
    let mut changed = BitSet::new();
    pv_copy.init(&master, &mut copy, &mut changed).unwrap();

    master.set_scalar("alarm.severity", 3).unwrap();
    changed.clear_all();
    pv_copy
        .update_copy_set_bitset(&master, &mut copy, &mut changed)
        .unwrap();
    assert_eq!(pv_copy.get_copy_offset(3), Some(2));
    assert_eq!(bits(&changed), vec![2]);
    assert_eq!(copy.get_i64("alarm.severity"), Some(3));

    changed.clear_all();
    pv_copy
        .update_copy_set_bitset(&master, &mut copy, &mut changed)
        .unwrap();
    assert!(changed.is_empty());
}

#[test]
fn scenario_record_options_stay_out_of_the_data() {
    let master = scenario_master();
    let pv_copy =
        PVCopy::create_from_str(&master, "record[process=true]field(value)", "field").unwrap();
    assert_eq!(child_names(pv_copy.copy_structure()), vec!["value"]);
    assert_eq!(pv_copy.get_options(0).unwrap()["process"], "true");
    assert_eq!(pv_copy.record_options(), pv_copy.get_options(0));
    assert!(pv_copy.get_options(1).is_none());
}

#[test]
fn offsets_resolve_both_ways() {
    let master = scenario_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(timeStamp{nsec},value)", "field").unwrap();
    // copy: timeStamp 1, nsec 2, value 3
    assert_eq!(pv_copy.get_copy_offset(0), Some(0));
    assert_eq!(pv_copy.get_copy_offset(7), Some(2));
    assert_eq!(pv_copy.get_copy_offset(6), None);
    assert_eq!(pv_copy.get_copy_offset(5), Some(1));
    assert_eq!(pv_copy.get_copy_offset(1), Some(3));
    assert_eq!(pv_copy.get_copy_offset(3), None);

    assert_eq!(pv_copy.get_master_offset(2), Ok(7));
    assert_eq!(pv_copy.get_master_offset(1), Ok(5));
    assert_eq!(pv_copy.get_master_offset(3), Ok(1));
    assert_eq!(
        pv_copy.get_master_offset(4),
        Err(CopyError::OffsetOutOfRange { offset: 4, len: 4 })
    );
    let entry = pv_copy.get_master_field(&master, 2).unwrap();
    assert_eq!(entry.full_name(), "timeStamp.nsec");

    let mut visited = Vec::new();
    pv_copy.traverse_master(|offset| visited.push(offset));
    assert_eq!(visited, vec![7, 1]);
}

#[test]
fn options_come_from_the_deepest_node() {
    let master = scenario_master();
    let pv_copy =
        PVCopy::create_from_str(&master, "field(alarm[a=1]{severity[b=2],message})", "field")
            .unwrap();
    // copy: alarm 1, severity 2, message 3
    assert_eq!(pv_copy.get_options(1).unwrap()["a"], "1");
    assert_eq!(pv_copy.get_options(2).unwrap()["b"], "2");
    assert!(pv_copy.get_options(3).is_none());
    assert!(pv_copy.get_options(0).is_none());
    assert!(pv_copy.get_options(9).is_none());
}

#[test]
fn update_master_writes_selected_fields() {
    let mut master = scenario_master();
    let request = parse_request("putField(alarm.message,value)field(value)").unwrap();
    let pv_copy = PVCopy::create(&master, &request, "putField").unwrap();
    // copy: alarm 1, message 2, value 3
    let mut copy = pv_copy.create_instance();
    copy.set_scalar("alarm.message", "LOW").unwrap();
    copy.set_scalar("value", 99.0).unwrap();

    let mut changed: BitSet = [2].into_iter().collect();
    pv_copy.update_master(&mut master, &copy, &mut changed).unwrap();
    assert_eq!(master.get_str("alarm.message"), Some("LOW"));
    assert_eq!(master.get_f64("value"), Some(12.5));
    assert_eq!(master.get_i64("alarm.severity"), Some(1));

    let mut all: BitSet = [0].into_iter().collect();
    pv_copy.update_master(&mut master, &copy, &mut all).unwrap();
    assert_eq!(master.get_f64("value"), Some(99.0));

    let get = PVCopy::create(&master, &request, "getField").unwrap();
    assert_eq!(child_names(get.copy_structure()), vec!["value"]);
}

#[test]
fn partial_bits_inside_a_whole_structure() {
    let master = scenario_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(alarm)", "field").unwrap();
    let mut copy = pv_copy.create_instance();
    let mut changed: BitSet = [2].into_iter().collect();
    pv_copy
        .update_copy_from_bitset(&master, &mut copy, &mut changed)
        .unwrap();
    assert_eq!(copy.get_i64("alarm.severity"), Some(1));
    assert_eq!(copy.get_str("alarm.message"), Some(""));
}

#[test]
fn dump_shows_schema_and_mapping() {
    let master = scenario_master();
    let pv_copy = PVCopy::create_from_str(&master, "field(value)", "field").unwrap();
    assert_eq!(
        pv_copy.dump(),
        "structure\n    double value\nstructure copy=0 count=2 master=0\n    master copy=1 count=1 master=1"
    );
}
