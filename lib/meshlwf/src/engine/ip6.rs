// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The IPv6 header fields the delivery filter looks at.
use crate::api::Ipv6Addr;
use crate::d_error::DError;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::UdpPacket;

pub const IPV6_HDR_SZ: usize = 40;
pub const UDP_HDR_SZ: usize = 8;
pub const IPV6_VERSION: u8 = 6;

/// UDP port of Mesh Link Establishment. MLE runs link-local between
/// mesh neighbours and is consumed entirely by the mesh stack.
pub const MLE_PORT: u16 = 19788;

#[derive(Clone, Copy, Debug, DError, Eq, PartialEq)]
#[derror(leaf_data = Ipv6HdrError::data)]
pub enum Ipv6HdrError {
    Truncated {
        len: usize,
    },
    #[leaf]
    BadVersion(u8),
}

impl Ipv6HdrError {
    fn data(&self, data: &mut [u64]) {
        data[0] = match self {
            Self::Truncated { len } => *len as u64,
            Self::BadVersion(v) => u64::from(*v),
        };
    }
}

/// A summary of an IPv6 datagram's fixed header, and its UDP ports
/// when a full UDP header follows it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Meta {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub next_hdr: IpProtocol,
    pub udp_ports: Option<(u16, u16)>,
}

impl Ipv6Meta {
    /// Read the header at the start of `buf`, which holds the entire
    /// datagram.
    ///
    /// Only the fixed header is validated. A payload length that
    /// disagrees with `buf` is not an error here: the delivery path
    /// forwards what the mesh stack handed it.
    pub fn parse(buf: &[u8]) -> Result<Self, Ipv6HdrError> {
        if buf.len() < IPV6_HDR_SZ {
            return Err(Ipv6HdrError::Truncated { len: buf.len() });
        }

        let pkt = Ipv6Packet::new_unchecked(buf);
        if pkt.version() != IPV6_VERSION {
            return Err(Ipv6HdrError::BadVersion(pkt.version()));
        }

        let next_hdr = pkt.next_header();
        let udp_ports = if next_hdr == IpProtocol::Udp
            && buf.len() >= IPV6_HDR_SZ + UDP_HDR_SZ
        {
            let udp = UdpPacket::new_unchecked(&buf[IPV6_HDR_SZ..]);
            Some((udp.src_port(), udp.dst_port()))
        } else {
            None
        };

        Ok(Self {
            src: Ipv6Addr::from(pkt.src_addr().0),
            dst: Ipv6Addr::from(pkt.dst_addr().0),
            next_hdr,
            udp_ports,
        })
    }

    /// Is this a UDP datagram from and to the MLE port?
    pub fn is_mle(&self) -> bool {
        self.udp_ports == Some((MLE_PORT, MLE_PORT))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use smoltcp::wire::Ipv6Address;
    use smoltcp::wire::Ipv6Repr;

    fn datagram(next_header: IpProtocol, payload: &[u8]) -> Vec<u8> {
        let repr = Ipv6Repr {
            src_addr: Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 2),
            dst_addr: Ipv6Address::new(0xff02, 0, 0, 0, 0, 0, 0, 1),
            next_header,
            payload_len: payload.len(),
            hop_limit: 255,
        };
        let mut buf = vec![0u8; repr.buffer_len() + payload.len()];
        repr.emit(&mut Ipv6Packet::new_unchecked(&mut buf));
        buf[IPV6_HDR_SZ..].copy_from_slice(payload);
        buf
    }

    #[test]
    fn udp_ports() {
        let mut udp = [0u8; UDP_HDR_SZ];
        udp[0..2].copy_from_slice(&MLE_PORT.to_be_bytes());
        udp[2..4].copy_from_slice(&MLE_PORT.to_be_bytes());
        let meta = Ipv6Meta::parse(&datagram(IpProtocol::Udp, &udp)).unwrap();
        assert_eq!(meta.dst, Ipv6Addr::ALL_NODES);
        assert_eq!(meta.src, "fe80::2".parse().unwrap());
        assert!(meta.is_mle());

        // A truncated UDP header has no ports.
        let meta =
            Ipv6Meta::parse(&datagram(IpProtocol::Udp, &udp[..7])).unwrap();
        assert_eq!(meta.udp_ports, None);
    }

    #[test]
    fn not_udp() {
        let meta = Ipv6Meta::parse(&datagram(IpProtocol::Icmpv6, &[0; 8]))
            .unwrap();
        assert_eq!(meta.next_hdr, IpProtocol::Icmpv6);
        assert!(!meta.is_mle());
    }

    #[test]
    fn bad_headers() {
        assert_eq!(
            Ipv6Meta::parse(&[0x60; 39]),
            Err(Ipv6HdrError::Truncated { len: 39 })
        );

        let mut buf = datagram(IpProtocol::Udp, &[0; 8]);
        buf[0] = 0x40;
        assert_eq!(Ipv6Meta::parse(&buf), Err(Ipv6HdrError::BadVersion(4)));
    }
}
