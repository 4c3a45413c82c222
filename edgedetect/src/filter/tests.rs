use hashbrown::HashSet;

use super::*;

const FAMILIES: [FilterFamily; 4] = [
    FilterFamily::Scharr,
    FilterFamily::Sobel,
    FilterFamily::Prewitt,
    FilterFamily::Roberts,
];
const AXES: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];

#[test]
fn dispatch_table_is_one_to_one() {
    let mut seen = HashSet::new();
    for family in FAMILIES {
        for axis in AXES {
            let (op, _) = select_operation(FilterRequest::new(family, axis));
            assert!(seen.insert(op), "{:?}/{:?} reused {}", family, axis, op);
        }
    }
    assert_eq!(seen.len(), FilterOp::ALL.len());
}

#[test]
fn only_scharr_outputs_signed_16() {
    for family in FAMILIES {
        for axis in AXES {
            let (op, kind) = select_operation(FilterRequest::new(family, axis));
            let expected = if family == FilterFamily::Scharr {
                SampleKind::Signed16
            } else {
                SampleKind::Unsigned8
            };
            assert_eq!(kind, expected, "{}", op);
            assert_eq!(op.output_kind(), kind);
        }
    }
}

#[test]
fn axis_selects_expected_variant() {
    let pick = |family, axis| select_operation(FilterRequest::new(family, axis)).0;

    assert_eq!(pick(FilterFamily::Sobel, Axis::Horizontal), FilterOp::SobelHoriz);
    assert_eq!(pick(FilterFamily::Sobel, Axis::Vertical), FilterOp::SobelVert);
    assert_eq!(pick(FilterFamily::Scharr, Axis::Vertical), FilterOp::ScharrVert);
    assert_eq!(pick(FilterFamily::Roberts, Axis::Horizontal), FilterOp::RobertsDown);
    assert_eq!(pick(FilterFamily::Roberts, Axis::Vertical), FilterOp::RobertsUp);
}

#[test]
fn default_request_is_horizontal_sobel() {
    let request = FilterRequest::default();
    assert_eq!(request.family, FilterFamily::Sobel);
    assert_eq!(request.axis, Axis::Horizontal);
}

#[test]
fn masks_sum_to_zero() {
    for op in FilterOp::ALL {
        let sum: i32 = op.mask().iter().flatten().sum();
        assert_eq!(sum, 0, "{}", op);
    }
}
