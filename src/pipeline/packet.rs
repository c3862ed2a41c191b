use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use std::net::IpAddr;

const IPV6_HEADER_LEN: u64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

/// Canonical record of one captured packet. Everything the flow
/// aggregation needs, nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
    pub size: u64,
}

/// Parse a raw Ethernet frame into a [PacketRecord].
///
/// Supported: IPv4/IPv6 carrying TCP, UDP or ICMP. Anything else, or a
/// frame too short for its headers, yields `None` and is skipped upstream.
pub fn normalize(frame: &[u8]) -> Option<PacketRecord> {
    let ethernet = EthernetPacket::new(frame)?;

    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => {
            let ip = Ipv4Packet::new(ethernet.payload())?;
            transport(
                IpAddr::V4(ip.get_source()),
                IpAddr::V4(ip.get_destination()),
                ip.get_next_level_protocol(),
                ip.payload(),
                ip.get_total_length() as u64,
            )
        }
        EtherTypes::Ipv6 => {
            let ip = Ipv6Packet::new(ethernet.payload())?;
            transport(
                IpAddr::V6(ip.get_source()),
                IpAddr::V6(ip.get_destination()),
                ip.get_next_header(),
                ip.payload(),
                ip.get_payload_length() as u64 + IPV6_HEADER_LEN,
            )
        }
        _ => None,
    }
}

fn transport(
    src_ip: IpAddr,
    dst_ip: IpAddr,
    protocol: IpNextHeaderProtocol,
    payload: &[u8],
    size: u64,
) -> Option<PacketRecord> {
    match protocol {
        IpNextHeaderProtocols::Tcp => {
            let tcp = TcpPacket::new(payload)?;
            Some(PacketRecord {
                src_ip,
                dst_ip,
                src_port: tcp.get_source(),
                dst_port: tcp.get_destination(),
                protocol: Protocol::Tcp,
                size,
            })
        }
        IpNextHeaderProtocols::Udp => {
            let udp = UdpPacket::new(payload)?;
            Some(PacketRecord {
                src_ip,
                dst_ip,
                src_port: udp.get_source(),
                dst_port: udp.get_destination(),
                protocol: Protocol::Udp,
                size,
            })
        }
        // ICMP carries no ports, the flow key uses zeroes
        IpNextHeaderProtocols::Icmp | IpNextHeaderProtocols::Icmpv6 => Some(PacketRecord {
            src_ip,
            dst_ip,
            src_port: 0,
            dst_port: 0,
            protocol: Protocol::Icmp,
            size,
        }),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
    use pnet::packet::ip::IpNextHeaderProtocols;
    use pnet::packet::ipv4::MutableIpv4Packet;
    use pnet::packet::tcp::MutableTcpPacket;
    use pnet::packet::udp::MutableUdpPacket;
    use std::net::Ipv4Addr;

    const ETHERNET_HEADER_LEN: usize = 14;
    const IPV4_HEADER_LEN: usize = 20;

    fn ipv4_frame(
        src: Ipv4Addr,
        dst: Ipv4Addr,
        protocol: pnet::packet::ip::IpNextHeaderProtocol,
        transport_len: usize,
    ) -> Vec<u8> {
        let ip_len = IPV4_HEADER_LEN + transport_len;
        let mut buf = vec![0u8; ETHERNET_HEADER_LEN + ip_len];

        let mut ethernet = MutableEthernetPacket::new(&mut buf).unwrap();
        ethernet.set_ethertype(EtherTypes::Ipv4);

        let mut ip = MutableIpv4Packet::new(&mut buf[ETHERNET_HEADER_LEN..]).unwrap();
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_total_length(ip_len as u16);
        ip.set_next_level_protocol(protocol);
        ip.set_source(src);
        ip.set_destination(dst);

        buf
    }

    pub fn udp_frame(
        src: Ipv4Addr,
        dst: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        payload_len: usize,
    ) -> Vec<u8> {
        let udp_len = 8 + payload_len;
        let mut buf = ipv4_frame(src, dst, IpNextHeaderProtocols::Udp, udp_len);

        let mut udp =
            MutableUdpPacket::new(&mut buf[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..]).unwrap();
        udp.set_source(src_port);
        udp.set_destination(dst_port);
        udp.set_length(udp_len as u16);

        buf
    }

    pub fn tcp_frame(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut buf = ipv4_frame(src, dst, IpNextHeaderProtocols::Tcp, 20);

        let mut tcp =
            MutableTcpPacket::new(&mut buf[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..]).unwrap();
        tcp.set_source(src_port);
        tcp.set_destination(dst_port);
        tcp.set_data_offset(5);

        buf
    }

    pub fn icmp_frame(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        ipv4_frame(src, dst, IpNextHeaderProtocols::Icmp, 8)
    }
}
