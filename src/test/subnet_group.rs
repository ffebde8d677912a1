use crate::error::FabricError;
use crate::routing::{ShapeSupport, subnet_group};

#[test]
fn subnet_group_k4_reference_windows() {
    assert_eq!(subnet_group(4, 1, ShapeSupport::Reference).unwrap(), vec![1, 2]);
    assert_eq!(subnet_group(4, 2, ShapeSupport::Reference).unwrap(), vec![1, 2]);
    assert_eq!(subnet_group(4, 7, ShapeSupport::Reference).unwrap(), vec![7, 8]);
    assert_eq!(subnet_group(4, 8, ShapeSupport::Reference).unwrap(), vec![7, 8]);
}

#[test]
fn subnet_group_k8_reference_windows() {
    for num in 5..=8 {
        assert_eq!(
            subnet_group(8, num, ShapeSupport::Reference).unwrap(),
            vec![5, 6, 7, 8],
            "agg {num}"
        );
    }
}

#[test]
fn subnet_group_general_formula_matches_reference_tables() {
    for k in [4, 8] {
        for num in 1..=k * k / 2 {
            assert_eq!(
                subnet_group(k, num, ShapeSupport::General).unwrap(),
                subnet_group(k, num, ShapeSupport::Reference).unwrap(),
                "k={k} agg={num}"
            );
        }
    }
}

#[test]
fn subnet_group_general_formula_covers_other_shapes() {
    for k in [2, 6, 10, 12] {
        let half = k / 2;
        for num in 1..=k * half {
            let group = subnet_group(k, num, ShapeSupport::General).unwrap();
            let pod = (num - 1) / half;
            let expected: Vec<usize> = (pod * half + 1..=pod * half + half).collect();
            assert_eq!(group, expected, "k={k} agg={num}");
        }
    }
}

#[test]
fn subnet_group_reference_rejects_other_k() {
    for k in [2, 6, 10] {
        assert_eq!(
            subnet_group(k, 1, ShapeSupport::Reference),
            Err(FabricError::UnsupportedTopology { k })
        );
    }
}

#[test]
fn subnet_group_rejects_bad_arguments() {
    assert!(matches!(
        subnet_group(5, 1, ShapeSupport::General),
        Err(FabricError::InvalidParameter(_))
    ));
    assert!(matches!(
        subnet_group(4, 0, ShapeSupport::General),
        Err(FabricError::InvalidParameter(_))
    ));
}
