use proptest::prelude::*;
use tigerbox_core::{AxisMapper, BuildConfig, Operation};

fn mapper() -> AxisMapper {
    AxisMapper::new(&BuildConfig::simulated(&["X", "Y", "Z", "M", "N"]).unwrap())
}

fn letters(axes: &[tigerbox_core::Axis]) -> String {
    axes.iter().map(|a| a.letter()).collect()
}

#[test]
fn test_filter_wheel_axes_are_unknown() {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert(
        "Motor Axes".to_string(),
        vec!["X".to_string(), "0".to_string()],
    );
    let config = BuildConfig::from_fields(fields).unwrap();
    let mapper = AxisMapper::new(&config);
    assert!(mapper.resolve(Operation::Home, &["0"]).is_err());
    assert_eq!(letters(&mapper.resolve::<&str>(Operation::Home, &[]).unwrap()), "X");
}

#[test]
fn test_mixed_keeps_hardware_order() {
    let set = mapper()
        .resolve_mixed(Operation::SetHome, &["z"], &[("x", 1.5)])
        .unwrap();
    let entries: Vec<_> = set.iter().cloned().collect();
    assert_eq!(entries[0].0.letter(), 'X');
    assert_eq!(entries[0].1, Some(1.5));
    assert_eq!(entries[1].0.letter(), 'Z');
    assert_eq!(entries[1].1, None);
}

proptest! {
    #[test]
    fn resolution_ignores_case_and_order(
        picks in proptest::sample::subsequence(vec!['X', 'Y', 'Z', 'M', 'N'], 1..=5),
        shuffle_seed in any::<u64>(),
        lower_mask in any::<u8>(),
    ) {
        let canonical: Vec<String> = picks.iter().map(|c| c.to_string()).collect();

        let mut scrambled = canonical.clone();
        let len = scrambled.len();
        scrambled.rotate_left((shuffle_seed as usize) % len);
        if shuffle_seed % 2 == 0 {
            scrambled.reverse();
        }
        let scrambled: Vec<String> = scrambled
            .into_iter()
            .enumerate()
            .map(|(i, s)| if lower_mask & (1 << i) != 0 { s.to_lowercase() } else { s })
            .collect();

        let a = mapper().resolve(Operation::Home, &canonical).unwrap();
        let b = mapper().resolve(Operation::Home, &scrambled).unwrap();
        prop_assert_eq!(letters(&a), letters(&b));
    }
}
