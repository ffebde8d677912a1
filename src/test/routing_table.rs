use crate::error::FabricError;
use crate::net::{AddressPlan, Layer, SwitchId};
use crate::routing::{
    CompilerOpts, DOWNSTREAM_PRIORITY, DstMatch, FlowRule, ForwardingPlan, RoutingCompiler,
    RuleTable, ShapeSupport, TrafficClass, UPSTREAM_PRIORITY, UplinkPolicy,
};
use crate::topo::fat_tree::FatTreeTopology;
use std::collections::HashMap;
use std::net::Ipv4Addr;

fn compile(k: usize, d: usize, opts: CompilerOpts) -> ForwardingPlan {
    let topo = FatTreeTopology::new(k, d).unwrap();
    let addrs = AddressPlan::assign(&topo).unwrap();
    RoutingCompiler::new(&topo, &addrs, opts)
        .unwrap()
        .compile_all()
        .unwrap()
}

fn downstream(table: &RuleTable) -> Vec<&FlowRule> {
    table
        .rules
        .iter()
        .filter(|r| r.priority == DOWNSTREAM_PRIORITY)
        .collect()
}

/// (目的匹配, 输出端口)，只看 IP 规则
fn ip_routes(table: &RuleTable) -> Vec<(String, u32)> {
    downstream(table)
        .into_iter()
        .filter(|r| r.matcher.class == TrafficClass::Ip)
        .map(|r| (r.matcher.dst.to_string(), r.out_port()))
        .collect()
}

#[test]
fn k4_edge_switch_routes_each_host_to_its_port() {
    let plan = compile(4, 2, CompilerOpts::default());
    let e1 = plan.table(SwitchId::edge(1)).unwrap();
    assert_eq!(
        ip_routes(e1),
        vec![("10.1.0.1".to_string(), 3), ("10.1.0.2".to_string(), 4)]
    );
    // 每台主机 ARP + IP 两条
    assert_eq!(downstream(e1).len(), 4);
}

#[test]
fn k4_agg_switch_routes_its_pod_subnets() {
    let plan = compile(4, 2, CompilerOpts::default());
    assert_eq!(
        ip_routes(plan.table(SwitchId::agg(1)).unwrap()),
        vec![("10.1.0.0/16".to_string(), 3), ("10.2.0.0/16".to_string(), 4)]
    );
    assert_eq!(
        ip_routes(plan.table(SwitchId::agg(4)).unwrap()),
        vec![("10.3.0.0/16".to_string(), 3), ("10.4.0.0/16".to_string(), 4)]
    );
}

#[test]
fn k4_core_switch_groups_edges_by_pod() {
    let plan = compile(4, 2, CompilerOpts::default());
    let expected: Vec<(String, u32)> = (1..=8)
        .map(|e| (format!("10.{e}.0.0/16"), ((e - 1) / 2 + 1) as u32))
        .collect();
    for core in 1..=4 {
        assert_eq!(ip_routes(plan.table(SwitchId::core(core)).unwrap()), expected);
    }
}

#[test]
fn downstream_ports_stay_in_layer_ranges() {
    for (k, d) in [(4, 1), (4, 2), (8, 3), (8, 4)] {
        let plan = compile(k, d, CompilerOpts::default());
        let half = (k / 2) as u32;
        for table in plan.iter() {
            for rule in downstream(table) {
                let port = rule.out_port();
                let ok = match table.switch.layer {
                    Layer::Edge => (half + 1..=half + d as u32).contains(&port),
                    Layer::Agg => (half + 1..=k as u32).contains(&port),
                    Layer::Core => (1..=k as u32).contains(&port),
                };
                assert!(ok, "k={k} d={d} {} port {port}", table.switch);
            }
        }
    }
}

#[test]
fn uplink_rules_spread_slots_over_uplinks() {
    let plan = compile(4, 3, CompilerOpts::default());
    for sw in [SwitchId::edge(5), SwitchId::agg(2)] {
        let up: Vec<(String, u32)> = plan
            .table(sw)
            .unwrap()
            .rules
            .iter()
            .filter(|r| r.priority == UPSTREAM_PRIORITY && r.matcher.class == TrafficClass::Ip)
            .map(|r| (r.matcher.dst.to_string(), r.out_port()))
            .collect();
        assert_eq!(
            up,
            vec![
                ("0.0.0.1/0.0.0.255".to_string(), 1),
                ("0.0.0.2/0.0.0.255".to_string(), 2),
                ("0.0.0.3/0.0.0.255".to_string(), 1),
            ]
        );
    }
    // core 没有上行
    assert!(
        plan.table(SwitchId::core(1))
            .unwrap()
            .rules
            .iter()
            .all(|r| r.priority == DOWNSTREAM_PRIORITY)
    );
}

#[test]
fn uplink_policy_none_compiles_downstream_only() {
    let opts = CompilerOpts {
        uplink: UplinkPolicy::None,
        ..CompilerOpts::default()
    };
    let plan = compile(4, 2, opts);
    for table in plan.iter() {
        assert!(table.rules.iter().all(|r| r.priority == DOWNSTREAM_PRIORITY));
    }
    assert_eq!(plan.table(SwitchId::edge(1)).unwrap().len(), 4);
    assert_eq!(plan.table(SwitchId::agg(1)).unwrap().len(), 4);
    assert_eq!(plan.table(SwitchId::core(1)).unwrap().len(), 16);
}

#[test]
fn arp_and_ip_rules_select_the_same_port() {
    let plan = compile(8, 4, CompilerOpts::default());
    for table in plan.iter() {
        let mut by_dst: HashMap<(u16, DstMatch), Vec<(TrafficClass, u32)>> = HashMap::new();
        for rule in &table.rules {
            by_dst
                .entry((rule.priority, rule.matcher.dst))
                .or_default()
                .push((rule.matcher.class, rule.out_port()));
        }
        for (key, entries) in by_dst {
            assert_eq!(entries.len(), 2, "{} {key:?}", table.switch);
            assert_eq!(entries[0].0, TrafficClass::Arp);
            assert_eq!(entries[1].0, TrafficClass::Ip);
            assert_eq!(entries[0].1, entries[1].1, "{} {key:?}", table.switch);
        }
    }
}

#[test]
fn no_destination_is_ambiguous_at_equal_priority() {
    let topo = FatTreeTopology::new(8, 2).unwrap();
    let addrs = AddressPlan::assign(&topo).unwrap();
    let plan = RoutingCompiler::new(&topo, &addrs, CompilerOpts::default())
        .unwrap()
        .compile_all()
        .unwrap();
    for table in plan.iter() {
        for (_, addr) in addrs.iter() {
            for class in TrafficClass::ALL {
                let hits: Vec<&FlowRule> = table
                    .rules
                    .iter()
                    .filter(|r| r.matcher.matches(class, addr.0))
                    .collect();
                assert!(!hits.is_empty(), "{} misses {addr}", table.switch);
                let top = hits.iter().map(|r| r.priority).max().unwrap();
                let winners = hits.iter().filter(|r| r.priority == top).count();
                assert_eq!(winners, 1, "{} ambiguous for {addr}", table.switch);
            }
        }
    }
}

#[test]
fn compiling_twice_is_bit_identical() {
    let a = compile(8, 3, CompilerOpts::default());
    let b = compile(8, 3, CompilerOpts::default());
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(a.to_ofctl(), b.to_ofctl());
}

#[test]
fn parallel_compile_matches_sequential() {
    let topo = FatTreeTopology::new(8, 2).unwrap();
    let addrs = AddressPlan::assign(&topo).unwrap();
    let compiler = RoutingCompiler::new(&topo, &addrs, CompilerOpts::default()).unwrap();
    let seq = compiler.compile_all().unwrap();
    for workers in [1, 3, 16, 1000] {
        assert_eq!(compiler.compile_all_parallel(workers).unwrap(), seq);
    }
}

#[test]
fn per_switch_compile_depends_only_on_shape() {
    let topo = FatTreeTopology::new(4, 2).unwrap();
    let addrs = AddressPlan::assign(&topo).unwrap();
    let compiler = RoutingCompiler::new(&topo, &addrs, CompilerOpts::default()).unwrap();
    let plan = compiler.compile_all().unwrap();
    // 单独编译任意一台与全量编译中的那份完全一致
    for sw in topo.all_switches() {
        assert_eq!(&compiler.compile_switch(sw).unwrap(), plan.table(sw).unwrap());
    }
}

#[test]
fn plan_rule_totals_match_layer_formulas() {
    let (k, d) = (8, 4);
    let half = k / 2;
    let plan = compile(k, d, CompilerOpts::default());
    let edges = k * half;
    let edge_rules = 2 * d + 2 * d;
    let agg_rules = 2 * half + 2 * d;
    let core_rules = 2 * edges;
    assert_eq!(
        plan.total_rules(),
        edges * edge_rules + edges * agg_rules + half * half * core_rules
    );
}

#[test]
fn reference_shapes_reject_other_k() {
    let topo = FatTreeTopology::new(6, 2).unwrap();
    let addrs = AddressPlan::assign(&topo).unwrap();
    let opts = CompilerOpts {
        shapes: ShapeSupport::Reference,
        ..CompilerOpts::default()
    };
    assert!(matches!(
        RoutingCompiler::new(&topo, &addrs, opts),
        Err(FabricError::UnsupportedTopology { k: 6 })
    ));
    // general 策略下同一形状可以编译
    assert!(RoutingCompiler::new(&topo, &addrs, CompilerOpts::default()).is_ok());
}

#[test]
fn general_shapes_reject_unencodable_density() {
    let topo = FatTreeTopology::new(2, 300).unwrap();
    let addrs = AddressPlan::default();
    assert!(matches!(
        RoutingCompiler::new(&topo, &addrs, CompilerOpts::default()),
        Err(FabricError::UnsupportedTopology { k: 2 })
    ));
}

#[test]
fn compile_switch_rejects_foreign_switch() {
    let topo = FatTreeTopology::new(4, 2).unwrap();
    let addrs = AddressPlan::assign(&topo).unwrap();
    let compiler = RoutingCompiler::new(&topo, &addrs, CompilerOpts::default()).unwrap();
    assert!(matches!(
        compiler.compile_switch(SwitchId::core(5)),
        Err(FabricError::InvalidParameter(_))
    ));
}

#[test]
fn compiler_rejects_mismatched_address_plan() {
    let small = FatTreeTopology::new(4, 1).unwrap();
    let big = FatTreeTopology::new(4, 2).unwrap();
    let addrs = AddressPlan::assign(&small).unwrap();
    assert!(matches!(
        RoutingCompiler::new(&big, &addrs, CompilerOpts::default()),
        Err(FabricError::InvalidParameter(_))
    ));
}

#[test]
fn k2_degenerate_fabric_compiles() {
    let plan = compile(2, 1, CompilerOpts::default());
    assert_eq!(plan.tables.len(), 1 + 2 + 2);
    assert_eq!(
        ip_routes(plan.table(SwitchId::core(1)).unwrap()),
        vec![("10.1.0.0/16".to_string(), 1), ("10.2.0.0/16".to_string(), 2)]
    );
    let dst = Ipv4Addr::new(10, 2, 0, 1);
    let e1 = plan.table(SwitchId::edge(1)).unwrap();
    assert!(e1.rules.iter().any(|r| r.matcher.matches(TrafficClass::Ip, dst)));
}
