use crate::config::FabricConfig;
use crate::error::{ConfigError, FabricError};
use crate::routing::{ShapeSupport, UplinkPolicy};
use std::time::Duration;

#[test]
fn config_parses_minimal_json_with_defaults() {
    let cfg = FabricConfig::from_json_str(r#"{ "k": 4, "density": 2 }"#).expect("parse");
    assert_eq!(cfg.k, 4);
    assert_eq!(cfg.density, 2);
    assert_eq!(cfg.bandwidth.core_agg_mbps, 10);
    assert_eq!(cfg.bandwidth.edge_host_mbps, 10);
    assert_eq!(cfg.uplink, UplinkPolicy::SlotIndexed);
    assert_eq!(cfg.shapes, ShapeSupport::General);

    let opts = cfg.install_opts();
    assert_eq!(opts.workers, 8);
    assert_eq!(opts.timeout, Duration::from_secs(5));
    assert_eq!(opts.retries, 3);
}

#[test]
fn config_parses_full_json() {
    let raw = r#"
    {
        "k": 8,
        "density": 4,
        "bandwidth": { "core_agg_mbps": 40, "agg_edge_mbps": 20 },
        "uplink": "none",
        "shapes": "reference",
        "install": { "workers": 2, "timeout_ms": 250 }
    }
    "#;
    let cfg = FabricConfig::from_json_str(raw).expect("parse");
    assert_eq!(cfg.bandwidth.core_agg_mbps, 40);
    assert_eq!(cfg.bandwidth.agg_edge_mbps, 20);
    assert_eq!(cfg.bandwidth.edge_host_mbps, 10);
    assert_eq!(cfg.uplink, UplinkPolicy::None);
    assert_eq!(cfg.shapes, ShapeSupport::Reference);

    let opts = cfg.install_opts();
    assert_eq!(opts.workers, 2);
    assert_eq!(opts.timeout, Duration::from_millis(250));
    assert_eq!(opts.retries, 3);

    let compiled = cfg.compile().expect("k=8 is a reference shape");
    assert_eq!(compiled.topo.links()[0].bandwidth_mbps, 40);
}

#[test]
fn config_rejects_malformed_json() {
    let err = FabricConfig::from_json_str(r#"{ "k": "four" }"#).expect_err("bad json");
    assert!(matches!(err, ConfigError::Json(_)));
    let err = FabricConfig::load("/nonexistent/fabric.json").expect_err("missing file");
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn config_compile_surfaces_fabric_errors() {
    assert!(matches!(
        FabricConfig::new(3, 2).compile(),
        Err(FabricError::InvalidParameter(_))
    ));
    let mut cfg = FabricConfig::new(6, 2);
    cfg.shapes = ShapeSupport::Reference;
    assert_eq!(
        cfg.compile().map(|_| ()),
        Err(FabricError::UnsupportedTopology { k: 6 })
    );
}
