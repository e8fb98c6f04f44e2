// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! IPv6 datagram builders.
use meshlwf::api::Ipv6Addr;
use smoltcp::phy::ChecksumCapabilities;
use smoltcp::wire::IpAddress;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv6Address;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::Ipv6Repr;
use smoltcp::wire::UdpPacket;
use smoltcp::wire::UdpRepr;

fn smol(addr: Ipv6Addr) -> Ipv6Address {
    Ipv6Address(addr.bytes())
}

/// Build an IPv6 datagram carrying `payload` verbatim.
pub fn ip6_datagram(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    next_header: IpProtocol,
    payload: &[u8],
) -> Vec<u8> {
    let repr = Ipv6Repr {
        src_addr: smol(src),
        dst_addr: smol(dst),
        next_header,
        payload_len: payload.len(),
        hop_limit: 255,
    };
    let mut buf = vec![0u8; repr.buffer_len() + payload.len()];
    repr.emit(&mut Ipv6Packet::new_unchecked(&mut buf));
    buf[repr.buffer_len()..].copy_from_slice(payload);
    buf
}

/// Build an IPv6/UDP datagram with a valid UDP checksum.
pub fn ip6_udp(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    src_port: u16,
    dst_port: u16,
    body: &[u8],
) -> Vec<u8> {
    let udp = UdpRepr { src_port, dst_port };
    let ip = Ipv6Repr {
        src_addr: smol(src),
        dst_addr: smol(dst),
        next_header: IpProtocol::Udp,
        payload_len: udp.header_len() + body.len(),
        hop_limit: 255,
    };

    let mut buf = vec![0u8; ip.buffer_len() + ip.payload_len];
    ip.emit(&mut Ipv6Packet::new_unchecked(&mut buf));
    udp.emit(
        &mut UdpPacket::new_unchecked(&mut buf[ip.buffer_len()..]),
        &IpAddress::Ipv6(smol(src)),
        &IpAddress::Ipv6(smol(dst)),
        body.len(),
        |payload| payload.copy_from_slice(body),
        &ChecksumCapabilities::default(),
    );
    buf
}
