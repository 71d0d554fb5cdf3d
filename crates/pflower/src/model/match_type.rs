//! The closed [`MatchType`] enumeration and its static [`ValueFormat`] map.
//!
//! Re-architected from the teacher's static lookup-array-keyed-by-enumerant
//! pattern (e.g. `rip_netlink`'s handle/protocol tables) into a total
//! function `MatchType -> ValueFormat`, with an exhaustive match so a new
//! variant cannot be added without updating the mapping.

/// Bit-width and interpretation class of a match's value/mask payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    Bit1,
    Bit3,
    Bit6,
    Bit8,
    Bit12,
    Bit16,
    Bit20,
    Bit32,
    Mac,
    Ipv4,
    Ipv6,
}

impl ValueFormat {
    /// Significant bit width of this format.
    pub const fn bit_width(self) -> u32 {
        match self {
            ValueFormat::Bit1 => 1,
            ValueFormat::Bit3 => 3,
            ValueFormat::Bit6 => 6,
            ValueFormat::Bit8 => 8,
            ValueFormat::Bit12 => 12,
            ValueFormat::Bit16 => 16,
            ValueFormat::Bit20 => 20,
            ValueFormat::Bit32 => 32,
            ValueFormat::Mac => 48,
            ValueFormat::Ipv4 => 32,
            ValueFormat::Ipv6 => 128,
        }
    }

    /// Storage width in bytes: the byte-ceiling of `bit_width()`.
    pub const fn byte_width(self) -> usize {
        (self.bit_width() as usize).div_ceil(8)
    }
}

/// A single packet-field predicate identity. Each variant is bound to
/// exactly one [`ValueFormat`] via [`MatchType::value_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    EthSrc,
    EthDst,
    EthAny,
    EthProto,

    Ip4Src,
    Ip4Dst,
    Ip4Any,
    Ip4Tos,
    Ip4Ttl,
    Ip4L4Proto,
    Ip4L4Data,
    Ip4L4Src,
    Ip4L4Dst,
    Ip4L4Any,

    Ip6Src,
    Ip6Dst,
    Ip6Any,
    Ip6Tos,
    Ip6Ttl,
    Ip6L4Proto,
    Ip6L4Data,
    Ip6L4Src,
    Ip6L4Dst,
    Ip6L4Any,

    // L3-agnostic L4 variants: usable when the dialect doesn't pin an
    // address family (e.g. a bare `dst-port` with no `flow-type`).
    L4Src,
    L4Dst,
    L4Any,
    L4Data,

    VlanId,
    VlanPrio,
    VlanProto,
    CVlanId,
    CVlanPrio,
    CVlanProto,
    SVlanId,
    SVlanPrio,
    SVlanProto,
}

/// Every [`MatchType`] variant, in declaration order. Used to assign a
/// deterministic field order to the generated key record and the runtime
/// table entries derived from it, independent of the order matches happen
/// to appear in any particular Filter.
pub const ALL: &[MatchType] = {
    use MatchType::*;
    &[
        EthSrc, EthDst, EthAny, EthProto, Ip4Src, Ip4Dst, Ip4Any, Ip4Tos, Ip4Ttl, Ip4L4Proto,
        Ip4L4Data, Ip4L4Src, Ip4L4Dst, Ip4L4Any, Ip6Src, Ip6Dst, Ip6Any, Ip6Tos, Ip6Ttl,
        Ip6L4Proto, Ip6L4Data, Ip6L4Src, Ip6L4Dst, Ip6L4Any, L4Src, L4Dst, L4Any, L4Data, VlanId,
        VlanPrio, VlanProto, CVlanId, CVlanPrio, CVlanProto, SVlanId, SVlanPrio, SVlanProto,
    ]
};

impl MatchType {
    /// Total, exhaustive `MatchType -> ValueFormat` function. Adding a new
    /// `MatchType` variant without extending this match is a compile error.
    pub const fn value_format(self) -> ValueFormat {
        use MatchType::*;
        match self {
            EthSrc | EthDst | EthAny => ValueFormat::Mac,
            EthProto => ValueFormat::Bit16,

            Ip4Src | Ip4Dst | Ip4Any => ValueFormat::Ipv4,
            Ip4Tos => ValueFormat::Bit8,
            Ip4Ttl => ValueFormat::Bit8,
            Ip4L4Proto => ValueFormat::Bit8,
            Ip4L4Data => ValueFormat::Bit32,
            Ip4L4Src | Ip4L4Dst | Ip4L4Any => ValueFormat::Bit16,

            Ip6Src | Ip6Dst | Ip6Any => ValueFormat::Ipv6,
            Ip6Tos => ValueFormat::Bit8,
            Ip6Ttl => ValueFormat::Bit8,
            Ip6L4Proto => ValueFormat::Bit8,
            Ip6L4Data => ValueFormat::Bit32,
            Ip6L4Src | Ip6L4Dst | Ip6L4Any => ValueFormat::Bit16,

            L4Src | L4Dst | L4Any => ValueFormat::Bit16,
            L4Data => ValueFormat::Bit32,

            VlanId | CVlanId | SVlanId => ValueFormat::Bit12,
            VlanPrio | CVlanPrio | SVlanPrio => ValueFormat::Bit3,
            VlanProto | CVlanProto | SVlanProto => ValueFormat::Bit16,
        }
    }

    /// Whether this match type is carried by an Ethernet header field
    /// (MAC address, ethertype, or any VLAN tag field), or is a
    /// family-agnostic L4 field that can only be decoded by walking the
    /// Ethernet header first to find the carrying IP header.
    pub const fn needs_ethernet(self) -> bool {
        use MatchType::*;
        matches!(
            self,
            EthSrc
                | EthDst
                | EthAny
                | EthProto
                | VlanId
                | VlanPrio
                | VlanProto
                | CVlanId
                | CVlanPrio
                | CVlanProto
                | SVlanId
                | SVlanPrio
                | SVlanProto
                | L4Src
                | L4Dst
                | L4Any
                | L4Data
        )
    }

    /// A family-agnostic L4 field (`L4Src`/`L4Dst`/`L4Any`/`L4Data`) needs
    /// both IPv4 and IPv6 decode stages compiled in, since which family a
    /// given packet carries isn't known until runtime.
    pub const fn needs_ipv4(self) -> bool {
        use MatchType::*;
        matches!(
            self,
            Ip4Src
                | Ip4Dst
                | Ip4Any
                | Ip4Tos
                | Ip4Ttl
                | Ip4L4Proto
                | Ip4L4Data
                | Ip4L4Src
                | Ip4L4Dst
                | Ip4L4Any
                | L4Src
                | L4Dst
                | L4Any
                | L4Data
        )
    }

    pub const fn needs_ipv6(self) -> bool {
        use MatchType::*;
        matches!(
            self,
            Ip6Src
                | Ip6Dst
                | Ip6Any
                | Ip6Tos
                | Ip6Ttl
                | Ip6L4Proto
                | Ip6L4Data
                | Ip6L4Src
                | Ip6L4Dst
                | Ip6L4Any
                | L4Src
                | L4Dst
                | L4Any
                | L4Data
        )
    }

    /// Whether this match type reads into the 4-byte L4 payload window
    /// (ports or the raw data window), regardless of address family.
    pub const fn needs_l4_window(self) -> bool {
        use MatchType::*;
        matches!(
            self,
            Ip4L4Data
                | Ip4L4Src
                | Ip4L4Dst
                | Ip4L4Any
                | Ip6L4Data
                | Ip6L4Src
                | Ip6L4Dst
                | Ip6L4Any
                | L4Src
                | L4Dst
                | L4Any
                | L4Data
        )
    }

    pub const fn needs_cvlan(self) -> bool {
        use MatchType::*;
        matches!(self, CVlanId | CVlanPrio | CVlanProto | VlanId | VlanPrio | VlanProto)
    }

    pub const fn needs_svlan(self) -> bool {
        use MatchType::*;
        matches!(self, SVlanId | SVlanPrio | SVlanProto | VlanId | VlanPrio | VlanProto)
    }
}
