//! Code Emitter (spec.md §4.4): renders a [`Cprog`] into a self-contained,
//! deterministic C datapath source.
//!
//! Built as a [`Writer`] that accumulates typed fragments (includes, the
//! key struct, the map/table declaration, the entry function) and
//! performs one final join — the "structured emitter with typed
//! fragments" spec.md §9's design notes call for, standing in for the
//! teacher's variadic-printf-into-a-growing-buffer pattern while keeping
//! `cprog_to_buf`'s growth-on-demand contract at the edge (see
//! [`crate::cprog::buf::cprog_to_buf`]).

use std::fmt::Write as _;

use crate::cprog::schema::{self, KeyField};
use crate::cprog::{Cprog, Needs, Target};
use crate::error::{Error, Result};
use crate::model::{Action, Comparison, MatchType};

/// Compile-time bound on matches per rule the emitter will inline or loop
/// over (spec.md §4.4's `TooManyMatches`; mirrors [`crate::model::N_MAX`]).
const MAX_MATCHES: usize = crate::model::N_MAX;

/// Accumulates source fragments and performs one final deterministic join.
#[derive(Default)]
struct Writer {
    sections: Vec<String>,
}

impl Writer {
    fn push(&mut self, fragment: String) {
        self.sections.push(fragment);
    }

    fn finish(self) -> String {
        let mut out = self.sections.join("\n\n");
        out.push('\n');
        out
    }
}

/// Render `cprog` into the generated C source (spec.md §4.4).
pub fn emit(cprog: &Cprog) -> Result<String> {
    for rule in cprog.filter().rules() {
        if rule.matches().len() > MAX_MATCHES {
            return Err(Error::TooManyMatches {
                count: rule.matches().len(),
                limit: MAX_MATCHES,
            });
        }
    }

    let schema = schema::build(cprog.filter());
    let mut w = Writer::default();

    w.push(banner(cprog));
    w.push(includes(cprog.options.needs));
    w.push(key_struct(&schema));
    w.push(rule_entry_struct());
    w.push(map_decl(cprog.filter().len()));
    w.push(field_compare_helpers());
    w.push(entry_fn(cprog, &schema));

    Ok(w.finish())
}

fn banner(cprog: &Cprog) -> String {
    format!(
        "/*\n * Generated by pflower. Do not edit by hand.\n * target={:?} rules={} match_count={} license=\"{}\"\n */",
        cprog.options.target,
        cprog.filter().len(),
        cprog.options.match_count,
        cprog.options.license,
    )
}

fn includes(needs: Needs) -> String {
    let mut lines = vec![
        "#include <linux/bpf.h>".to_string(),
        "#include <bpf/bpf_helpers.h>".to_string(),
        "#include <linux/if_ether.h>".to_string(),
    ];
    if needs.contains(Needs::IPV4) {
        lines.push("#include <linux/ip.h>".to_string());
    }
    if needs.contains(Needs::IPV6) {
        lines.push("#include <linux/ipv6.h>".to_string());
    }
    if needs.contains(Needs::TCP) {
        lines.push("#include <linux/tcp.h>".to_string());
    }
    if needs.contains(Needs::UDP) {
        lines.push("#include <linux/udp.h>".to_string());
    }
    if needs.contains(Needs::SCTP) {
        lines.push("/* SCTP common header has no bpf-safe UAPI header; decoded inline below. */".to_string());
    }
    if needs.contains(Needs::CVLAN) || needs.contains(Needs::SVLAN) {
        lines.push("#include <linux/if_vlan.h>".to_string());
    }
    lines.join("\n")
}

/// C identifier for a schema field's key struct member.
fn field_name(kind: MatchType) -> &'static str {
    use MatchType::*;
    match kind {
        EthSrc => "eth_src",
        EthDst => "eth_dst",
        EthAny => "eth_any",
        EthProto => "eth_proto",
        Ip4Src => "ip4_src",
        Ip4Dst => "ip4_dst",
        Ip4Any => "ip4_any",
        Ip4Tos => "ip4_tos",
        Ip4Ttl => "ip4_ttl",
        Ip4L4Proto => "ip4_l4_proto",
        Ip4L4Data => "ip4_l4_data",
        Ip4L4Src => "ip4_l4_src",
        Ip4L4Dst => "ip4_l4_dst",
        Ip4L4Any => "ip4_l4_any",
        Ip6Src => "ip6_src",
        Ip6Dst => "ip6_dst",
        Ip6Any => "ip6_any",
        Ip6Tos => "ip6_tos",
        Ip6Ttl => "ip6_ttl",
        Ip6L4Proto => "ip6_l4_proto",
        Ip6L4Data => "ip6_l4_data",
        Ip6L4Src => "ip6_l4_src",
        Ip6L4Dst => "ip6_l4_dst",
        Ip6L4Any => "ip6_l4_any",
        L4Src => "l4_src",
        L4Dst => "l4_dst",
        L4Any => "l4_any",
        L4Data => "l4_data",
        VlanId => "vlan_id",
        VlanPrio => "vlan_prio",
        VlanProto => "vlan_proto",
        CVlanId => "cvlan_id",
        CVlanPrio => "cvlan_prio",
        CVlanProto => "cvlan_proto",
        SVlanId => "svlan_id",
        SVlanPrio => "svlan_prio",
        SVlanProto => "svlan_proto",
    }
}

fn key_struct(schema: &[KeyField]) -> String {
    let mut out = String::new();
    writeln!(out, "/* Key fields ordered by MatchType declaration order (spec.md §4.4 step 2); */").unwrap();
    writeln!(out, "/* dead (unreferenced) fields are simply absent, not zero-padded in place. */").unwrap();
    writeln!(out, "struct pflower_key {{").unwrap();
    if schema.is_empty() {
        writeln!(out, "    __u8 _unused; /* no matches reference any field */").unwrap();
    }
    for field in schema {
        writeln!(out, "    {} {}[{}];", "__u8", field_name(field.kind), field.width).unwrap();
    }
    write!(out, "}};").unwrap();
    out
}

fn rule_entry_struct() -> String {
    "struct pflower_rule_entry {\n    struct pflower_key key;\n    struct pflower_key mask;\n    __u8 action;\n};".to_string()
}

/// Byte-wise equality helpers shared by the inline and loop match stages,
/// standing in for an integer comparison since key fields are opaque
/// `__u8[width]` arrays (MAC/IPv6 addresses have no native scalar type).
fn field_compare_helpers() -> String {
    "static __always_inline int pflower_field_eq(const __u8 *a, const __u8 *b, int width)\n{\n    for (int i = 0; i < width; i++) {\n        if (a[i] != b[i])\n            return 0;\n    }\n    return 1;\n}\n\nstatic __always_inline int pflower_field_eq_masked(const __u8 *a, const __u8 *b, const __u8 *mask, int width)\n{\n    for (int i = 0; i < width; i++) {\n        if ((a[i] & mask[i]) != (b[i] & mask[i]))\n            return 0;\n    }\n    return 1;\n}".to_string()
}

fn map_decl(len: usize) -> String {
    let max_entries = len.max(1);
    format!(
        "struct {{\n    __uint(type, BPF_MAP_TYPE_ARRAY);\n    __uint(max_entries, {max_entries});\n    __type(key, __u32);\n    __type(value, struct pflower_rule_entry);\n}} pflower_rules SEC(\".maps\");"
    )
}

fn entry_fn(cprog: &Cprog, schema: &[KeyField]) -> String {
    let target = cprog.options.target;
    let mut out = String::new();

    writeln!(out, "SEC(\"{}\")", section_name(target)).unwrap();
    writeln!(
        out,
        "int {}(struct {} *ctx)",
        target.entry_fn_name(),
        target.verdict_type()
    )
    .unwrap();
    writeln!(out, "{{").unwrap();
    writeln!(out, "    struct pflower_key k = {{}};").unwrap();
    writeln!(out, "{}", decode_stage(cprog.options.needs, target, schema)).unwrap();

    if cprog.options.needs.contains(Needs::INLINE_MATCH) {
        write!(out, "{}", inline_match_stage(cprog, schema)).unwrap();
    } else {
        write!(out, "{}", loop_match_stage(cprog, schema)).unwrap();
    }

    if cprog.options.needs.contains(Needs::DEBUG_PRINT) {
        writeln!(
            out,
            "    bpf_printk(\"pflower: no rule matched, default verdict\");"
        )
        .unwrap();
    }
    writeln!(out, "out:").unwrap();
    writeln!(out, "    return {};", target.pass_verdict()).unwrap();
    write!(out, "}}").unwrap();
    out
}

fn section_name(target: Target) -> &'static str {
    match target {
        Target::IngressExpress => "xdp",
        Target::IngressClassifier => "tc",
    }
}

/// Decode stage (spec.md §4.4 step 5): walks headers in protocol order,
/// setting key fields as each header is parsed. A missing header (bounds
/// check failure) leaves later key fields zero and jumps straight to the
/// default verdict, which implicitly fails any rule requiring that header
/// since a zero-masked comparison can't distinguish zero-because-absent
/// from zero-because-matched -- callers needing that distinction should
/// pair the match with an explicit protocol-presence match.
fn decode_stage(needs: Needs, target: Target, schema: &[KeyField]) -> String {
    let mut out = String::new();
    let has = |kind: MatchType| schema.iter().any(|f| f.kind == kind);
    let (data, data_end) = match target {
        Target::IngressExpress => ("(void *)(long)ctx->data", "(void *)(long)ctx->data_end"),
        Target::IngressClassifier => ("(void *)(long)ctx->data", "(void *)(long)ctx->data_end"),
    };
    writeln!(out, "    void *data = {data};").unwrap();
    writeln!(out, "    void *data_end = {data_end};").unwrap();
    writeln!(out, "    void *cursor = data;").unwrap();

    if needs.contains(Needs::ETHERNET) {
        writeln!(out, "    struct ethhdr *eth = cursor;").unwrap();
        writeln!(out, "    if ((void *)(eth + 1) > data_end)").unwrap();
        writeln!(out, "        goto out;").unwrap();
        if has(MatchType::EthSrc) {
            writeln!(out, "    __builtin_memcpy(k.eth_src, eth->h_source, 6);").unwrap();
        }
        if has(MatchType::EthDst) {
            writeln!(out, "    __builtin_memcpy(k.eth_dst, eth->h_dest, 6);").unwrap();
        }
        if has(MatchType::EthProto) {
            writeln!(out, "    *(__u16 *)k.eth_proto = eth->h_proto;").unwrap();
        }
        writeln!(out, "    cursor = eth + 1;").unwrap();
        writeln!(out, "    __u16 ethertype = eth->h_proto;").unwrap();

        if needs.contains(Needs::CVLAN) || needs.contains(Needs::SVLAN) {
            writeln!(out, "    if (ethertype == bpf_htons(ETH_P_8021Q) || ethertype == bpf_htons(ETH_P_8021AD)) {{").unwrap();
            writeln!(out, "        struct vlan_hdr *vlan = cursor;").unwrap();
            writeln!(out, "        if ((void *)(vlan + 1) > data_end)").unwrap();
            writeln!(out, "            goto out;").unwrap();
            if has(MatchType::VlanId) {
                writeln!(out, "        *(__u16 *)k.vlan_id = vlan->h_vlan_TCI & bpf_htons(0x0fff);").unwrap();
            }
            writeln!(out, "        ethertype = vlan->h_vlan_encapsulated_proto;").unwrap();
            writeln!(out, "        cursor = vlan + 1;").unwrap();
            writeln!(out, "    }}").unwrap();
        }

        if needs.contains(Needs::IPV4) {
            writeln!(out, "    if (ethertype == bpf_htons(ETH_P_IP)) {{").unwrap();
            writeln!(out, "        struct iphdr *ip4 = cursor;").unwrap();
            writeln!(out, "        if ((void *)(ip4 + 1) > data_end)").unwrap();
            writeln!(out, "            goto out;").unwrap();
            if has(MatchType::Ip4Src) {
                writeln!(out, "        __builtin_memcpy(k.ip4_src, &ip4->saddr, 4);").unwrap();
            }
            if has(MatchType::Ip4Dst) {
                writeln!(out, "        __builtin_memcpy(k.ip4_dst, &ip4->daddr, 4);").unwrap();
            }
            if has(MatchType::Ip4Tos) {
                writeln!(out, "        k.ip4_tos[0] = ip4->tos;").unwrap();
            }
            if has(MatchType::Ip4Ttl) {
                writeln!(out, "        k.ip4_ttl[0] = ip4->ttl;").unwrap();
            }
            if has(MatchType::Ip4L4Proto) {
                writeln!(out, "        k.ip4_l4_proto[0] = ip4->protocol;").unwrap();
            }
            writeln!(out, "        cursor = (__u8 *)ip4 + (ip4->ihl * 4);").unwrap();
            if needs.contains(Needs::L4_WINDOW) {
                if has(MatchType::Ip4L4Data) {
                    writeln!(out, "        if (cursor + 4 <= data_end)").unwrap();
                    writeln!(out, "            __builtin_memcpy(k.ip4_l4_data, cursor, 4);").unwrap();
                }
                if has(MatchType::L4Data) {
                    writeln!(out, "        if (cursor + 4 <= data_end)").unwrap();
                    writeln!(out, "            __builtin_memcpy(k.l4_data, cursor, 4);").unwrap();
                }
                let wants_ports = has(MatchType::Ip4L4Src)
                    || has(MatchType::Ip4L4Dst)
                    || has(MatchType::L4Src)
                    || has(MatchType::L4Dst)
                    || has(MatchType::L4Any);
                if wants_ports {
                    writeln!(out, "        if (ip4->protocol == IPPROTO_TCP || ip4->protocol == IPPROTO_UDP) {{").unwrap();
                    writeln!(out, "            __u16 *ports = cursor;").unwrap();
                    writeln!(out, "            if ((void *)(ports + 2) <= data_end) {{").unwrap();
                    if has(MatchType::Ip4L4Src) {
                        writeln!(out, "                *(__u16 *)k.ip4_l4_src = ports[0];").unwrap();
                    }
                    if has(MatchType::Ip4L4Dst) {
                        writeln!(out, "                *(__u16 *)k.ip4_l4_dst = ports[1];").unwrap();
                    }
                    if has(MatchType::L4Src) {
                        writeln!(out, "                *(__u16 *)k.l4_src = ports[0];").unwrap();
                    }
                    if has(MatchType::L4Dst) {
                        writeln!(out, "                *(__u16 *)k.l4_dst = ports[1];").unwrap();
                    }
                    if has(MatchType::L4Any) {
                        // a single field can't hold both sides; dst is the
                        // more commonly filtered side so it wins here.
                        writeln!(out, "                *(__u16 *)k.l4_any = ports[1];").unwrap();
                    }
                    writeln!(out, "            }}").unwrap();
                    writeln!(out, "        }}").unwrap();
                }
            }
            writeln!(out, "    }}").unwrap();
        }

        if needs.contains(Needs::IPV6) {
            writeln!(out, "    if (ethertype == bpf_htons(ETH_P_IPV6)) {{").unwrap();
            writeln!(out, "        struct ipv6hdr *ip6 = cursor;").unwrap();
            writeln!(out, "        if ((void *)(ip6 + 1) > data_end)").unwrap();
            writeln!(out, "            goto out;").unwrap();
            if has(MatchType::Ip6Src) {
                writeln!(out, "        __builtin_memcpy(k.ip6_src, &ip6->saddr, 16);").unwrap();
            }
            if has(MatchType::Ip6Dst) {
                writeln!(out, "        __builtin_memcpy(k.ip6_dst, &ip6->daddr, 16);").unwrap();
            }
            if has(MatchType::Ip6L4Proto) {
                writeln!(out, "        k.ip6_l4_proto[0] = ip6->nexthdr;").unwrap();
            }
            if has(MatchType::Ip6Ttl) {
                writeln!(out, "        k.ip6_ttl[0] = ip6->hop_limit;").unwrap();
            }
            writeln!(out, "        cursor = ip6 + 1;").unwrap();
            if needs.contains(Needs::L4_WINDOW) {
                if has(MatchType::Ip6L4Data) {
                    writeln!(out, "        if (cursor + 4 <= data_end)").unwrap();
                    writeln!(out, "            __builtin_memcpy(k.ip6_l4_data, cursor, 4);").unwrap();
                }
                if has(MatchType::L4Data) {
                    writeln!(out, "        if (cursor + 4 <= data_end)").unwrap();
                    writeln!(out, "            __builtin_memcpy(k.l4_data, cursor, 4);").unwrap();
                }
                let wants_ports = has(MatchType::Ip6L4Src)
                    || has(MatchType::Ip6L4Dst)
                    || has(MatchType::L4Src)
                    || has(MatchType::L4Dst)
                    || has(MatchType::L4Any);
                if wants_ports {
                    writeln!(out, "        if (ip6->nexthdr == IPPROTO_TCP || ip6->nexthdr == IPPROTO_UDP) {{").unwrap();
                    writeln!(out, "            __u16 *ports = cursor;").unwrap();
                    writeln!(out, "            if ((void *)(ports + 2) <= data_end) {{").unwrap();
                    if has(MatchType::Ip6L4Src) {
                        writeln!(out, "                *(__u16 *)k.ip6_l4_src = ports[0];").unwrap();
                    }
                    if has(MatchType::Ip6L4Dst) {
                        writeln!(out, "                *(__u16 *)k.ip6_l4_dst = ports[1];").unwrap();
                    }
                    if has(MatchType::L4Src) {
                        writeln!(out, "                *(__u16 *)k.l4_src = ports[0];").unwrap();
                    }
                    if has(MatchType::L4Dst) {
                        writeln!(out, "                *(__u16 *)k.l4_dst = ports[1];").unwrap();
                    }
                    if has(MatchType::L4Any) {
                        writeln!(out, "                *(__u16 *)k.l4_any = ports[1];").unwrap();
                    }
                    writeln!(out, "            }}").unwrap();
                    writeln!(out, "        }}").unwrap();
                }
            }
            writeln!(out, "    }}").unwrap();
        }
    }

    out
}

/// Straight-line conjunction per rule, filter order (spec.md §4.4 step 6,
/// `inline-match`). Each rule becomes a single `if` testing every match
/// its rule carries; the first that is true returns immediately.
fn inline_match_stage(cprog: &Cprog, schema: &[KeyField]) -> String {
    let mut out = String::new();
    let use_masks = cprog.options.needs.contains(Needs::USE_MASKS);
    for (i, rule) in cprog.filter().rules().iter().enumerate() {
        let conjuncts: Vec<String> = rule
            .matches()
            .iter()
            .map(|m| {
                let field = schema.iter().find(|f| f.kind == m.kind).expect("schema covers every referenced kind");
                let mask = (use_masks && m.use_mask()).then(|| m.mask_bytes());
                comparison_expr(field, m.op, m.value_bytes(), mask)
            })
            .collect();
        writeln!(
            out,
            "    if ({}) /* rule {i} */",
            if conjuncts.is_empty() { "1".to_string() } else { conjuncts.join(" && ") }
        )
        .unwrap();
        writeln!(
            out,
            "        return {};",
            target_verdict(cprog.options.target, rule.action)
        )
        .unwrap();
    }
    out
}

/// Loop over the lookup table, short-circuiting on first match (spec.md
/// §4.4 step 6's non-`inline-match` path). `no-loops` unrolls to
/// `len(F)` iterations via `#pragma unroll` rather than changing the
/// loop's shape.
fn loop_match_stage(cprog: &Cprog, schema: &[KeyField]) -> String {
    let mut out = String::new();
    let len = cprog.filter().len().max(1);

    if cprog.options.needs.contains(Needs::NO_LOOPS) {
        writeln!(out, "    #pragma unroll").unwrap();
    }
    writeln!(out, "    for (__u32 i = 0; i < {len}; i++) {{").unwrap();
    writeln!(out, "        __u32 idx = i;").unwrap();
    writeln!(
        out,
        "        struct pflower_rule_entry *e = bpf_map_lookup_elem(&pflower_rules, &idx);"
    )
    .unwrap();
    writeln!(out, "        if (!e)").unwrap();
    writeln!(out, "            continue;").unwrap();

    let conjuncts: Vec<String> = schema.iter().map(field_table_expr).collect();
    writeln!(
        out,
        "        if ({}) {{",
        if conjuncts.is_empty() { "1".to_string() } else { conjuncts.join(" && ") }
    )
    .unwrap();
    writeln!(out, "            if (e->action == 0)").unwrap();
    writeln!(out, "                return {};", target_verdict(cprog.options.target, Action::Pass)).unwrap();
    writeln!(out, "            return {};", target_verdict(cprog.options.target, Action::Drop)).unwrap();
    writeln!(out, "        }}").unwrap();
    writeln!(out, "    }}").unwrap();
    out
}

fn target_verdict(target: Target, action: Action) -> &'static str {
    match action {
        Action::Pass => target.pass_verdict(),
        Action::Drop => target.drop_verdict(),
    }
}


/// Render `k.<field> op value` for an inlined match. Ordering operators
/// are only meaningful unmasked (memcmp over a big-endian byte string
/// agrees with unsigned numeric order); a masked match narrows to an
/// equality/inequality gate over the masked bits per spec.md §4.4 step 6
/// (`(field & mask) op (value & mask)` collapses to that for a two-valued
/// `op` once both sides are pre-masked at codegen time).
fn comparison_expr(field: &KeyField, op: Comparison, value: &[u8], mask: Option<&[u8]>) -> String {
    let lhs = format!("k.{}", field_name(field.kind));
    if let Some(mask) = mask {
        let eq = format!(
            "pflower_field_eq_masked({lhs}, {}, {}, {})",
            hex_bytes(value),
            hex_bytes(mask),
            field.width
        );
        return match op {
            Comparison::NotEqual => format!("(!{eq})"),
            _ => format!("({eq})"),
        };
    }
    format!("(__builtin_memcmp({lhs}, {}, {}) {} 0)", hex_bytes(value), field.width, op_str(op))
}

/// Render the table-driven comparison for one schema field against the
/// current lookup-table entry `e` (spec.md §4.4 step 6's masked form).
/// Always masked: `table.rs::build_entry` zero-fills the mask for any
/// field a given entry's rule doesn't reference, so an unmasked
/// comparison would reject entries on fields they never meant to
/// constrain. A masked comparison against a zero mask trivially passes,
/// which is exactly "don't care".
fn field_table_expr(field: &KeyField) -> String {
    let name = field_name(field.kind);
    format!("pflower_field_eq_masked(k.{name}, e->key.{name}, e->mask.{name}, {})", field.width)
}

fn op_str(op: Comparison) -> &'static str {
    match op {
        Comparison::Equal => "==",
        Comparison::NotEqual => "!=",
        Comparison::LessThan => "<",
        Comparison::LessOrEqual => "<=",
        Comparison::GreaterThan => ">",
        Comparison::GreaterOrEqual => ">=",
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let inner: Vec<String> = bytes.iter().map(|b| format!("0x{b:02x}")).collect();
    format!("((__u8[]){{{}}})", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cprog::{make_cprog, OptionOverrides};
    use crate::filter::Filter;
    use crate::model::{Action, Comparison, Match, MatchType, Rule};

    fn single_rule_filter() -> Filter {
        let mut f = Filter::new();
        let proto = Match::new(MatchType::Ip4L4Proto, Comparison::Equal, &[6]).unwrap();
        let port = Match::new(MatchType::Ip4L4Dst, Comparison::Equal, &22u16.to_be_bytes()).unwrap();
        f.insert(0, Rule::new(vec![proto, port], Action::Drop).unwrap())
            .unwrap();
        f
    }

    #[test]
    fn family_agnostic_port_match_decodes_and_compares() {
        let mut f = Filter::new();
        let port = Match::new(MatchType::L4Dst, Comparison::Equal, &80u16.to_be_bytes()).unwrap();
        f.insert(0, Rule::new(vec![port], Action::Drop).unwrap()).unwrap();

        let cprog = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        assert!(cprog.options.needs.contains(Needs::ETHERNET | Needs::IPV4 | Needs::IPV6));

        let src = emit(&cprog).unwrap();
        assert!(src.contains("k.l4_dst"));
        assert!(src.contains("struct iphdr"));
        assert!(src.contains("struct ipv6hdr"));
    }

    #[test]
    fn emits_deterministic_output_across_runs() {
        let f = single_rule_filter();
        let cprog1 = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        let cprog2 = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        assert_eq!(emit(&cprog1).unwrap(), emit(&cprog2).unwrap());
    }

    #[test]
    fn emitted_source_carries_entry_fn_and_verdicts() {
        let f = single_rule_filter();
        let cprog = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        let src = emit(&cprog).unwrap();
        assert!(src.contains("pflower_ingress_express"));
        assert!(src.contains("XDP_PASS"));
        assert!(src.contains("SEC(\"xdp\")"));
    }

    #[test]
    fn classifier_target_uses_tc_verdicts() {
        let f = single_rule_filter();
        let cprog = make_cprog(&f, Target::IngressClassifier, OptionOverrides::default()).unwrap();
        let src = emit(&cprog).unwrap();
        assert!(src.contains("TC_ACT_OK"));
        assert!(src.contains("__sk_buff"));
    }

    #[test]
    fn inline_match_emits_one_if_per_rule() {
        let f = single_rule_filter();
        let overrides = OptionOverrides {
            inline_match: true,
            ..Default::default()
        };
        let cprog = make_cprog(&f, Target::IngressExpress, overrides).unwrap();
        let src = emit(&cprog).unwrap();
        assert!(src.contains("/* rule 0 */"));
        assert!(!src.contains("bpf_map_lookup_elem"));
    }

    #[test]
    fn loop_match_references_the_rules_map() {
        let f = single_rule_filter();
        let cprog = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        let src = emit(&cprog).unwrap();
        assert!(src.contains("bpf_map_lookup_elem(&pflower_rules"));
        assert!(src.contains("for (__u32 i = 0; i < 1; i++)"));
    }

    #[test]
    fn emits_successfully_at_match_limit() {
        let mut f = Filter::new();
        let one = Match::new(MatchType::Ip4Ttl, Comparison::Equal, &[64]).unwrap();
        let matches: Vec<_> = std::iter::repeat(one).take(MAX_MATCHES).collect();
        f.insert(0, Rule::new(matches, Action::Drop).unwrap()).unwrap();
        let cprog = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        assert!(emit(&cprog).is_ok());
    }

    #[test]
    fn too_many_matches_is_rejected_at_emission() {
        // Rule::new and make_cprog both enforce N_MAX before emit() ever
        // runs; reach emit()'s own check directly via new_with_limit and a
        // hand-built Cprog, as if a caller with a raised rule-level limit
        // handed emit() a filter make_cprog would have rejected first.
        use crate::cprog::{CprogOptions, Helpers};
        let mut f = Filter::new();
        let one = Match::new(MatchType::Ip4Ttl, Comparison::Equal, &[64]).unwrap();
        let matches: Vec<_> = std::iter::repeat(one).take(MAX_MATCHES + 1).collect();
        let rule = Rule::new_with_limit(matches, Action::Drop, MAX_MATCHES + 1).unwrap();
        f.insert(0, rule).unwrap();
        let cprog = Cprog {
            filter: &f,
            options: CprogOptions {
                target: Target::IngressExpress,
                match_count: MAX_MATCHES + 1,
                needs: Needs::empty(),
                license: "GPL".to_string(),
                helpers: Helpers::MAP_LOOKUP,
            },
        };
        assert!(matches!(
            emit(&cprog),
            Err(Error::TooManyMatches { limit, .. }) if limit == MAX_MATCHES
        ));
    }

    #[test]
    fn key_struct_field_order_matches_schema() {
        let f = single_rule_filter();
        let cprog = make_cprog(&f, Target::IngressExpress, OptionOverrides::default()).unwrap();
        let src = emit(&cprog).unwrap();
        let schema = schema::build(&f);
        let dst_idx = src.find("ip4_l4_dst").unwrap();
        let proto_idx = src.find("ip4_l4_proto").unwrap();
        assert!(proto_idx < dst_idx, "fields render in schema (declaration) order");
        assert_eq!(schema[0].kind, MatchType::Ip4L4Proto);
    }
}
