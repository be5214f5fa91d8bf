//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` states for exercising the
//! collectors end to end.

use super::filesystem::MockFs;

impl MockFs {
    /// A small two-CPU host with one bond, two disks and IPv4 networking.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/sys/kernel/hostname", "web1\n");
        fs.add_file("/proc/sys/kernel/random/entropy_avail", "3421\n");
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
HugePages_Total:       0
",
        );
        fs.add_file(
            "/proc/vmstat",
            "\
nr_free_pages 2048000
pgpgin 123456
pgpgout 654321
pswpin 10
pswpout 20
pgfault 999999
pgmajfault 1234
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 5000 250 1500 40000 500 100 50 0 0 0
cpu1 5000 250 1500 40000 500 100 50 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 1
",
        );
        fs.add_file(
            "/proc/interrupts",
            "\
           CPU0       CPU1
  0:         45          0   IO-APIC-edge      timer
 24:      12345        678   PCI-MSI-edge      eth0
 25:        100        200   PCI-MSI-edge      ahci
NMI:          3          4   Non-maskable interrupts
LOC:    1000000     999999   Local timer interrupts
ERR:          0
",
        );
        fs.add_file(
            "/proc/net/sockstat",
            "\
sockets: used 320
TCP: inuse 12 orphan 0 tw 7 alloc 15 mem 3
UDP: inuse 4 mem 2
UDPLITE: inuse 0
RAW: inuse 0
FRAG: inuse 0 memory 0
",
        );
        fs.add_file(
            "/proc/net/netstat",
            "\
TcpExt: SyncookiesSent SyncookiesRecv TCPTimeouts
TcpExt: 0 0 42
IpExt: InNoRoutes InOctets
IpExt: 0 123456789
",
        );
        fs.add_file(
            "/proc/net/snmp",
            "\
Ip: Forwarding DefaultTTL InReceives
Ip: 2 64 1000
Tcp: RtoAlgorithm RtoMin ActiveOpens
Tcp: 1 200 300
",
        );
        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 12345 100 987654 5000 6789 50 456789 3000 0 4000 8000
   8       1 sda1 10000 800000 5000 400000
   8      16 sdb 0 0 0 0 0 0 0 0 0 0 0
",
        );
        fs.add_file(
            "/proc/net/bonding/bond0",
            "\
Ethernet Channel Bonding Driver: v3.7.1 (April 27, 2011)

Bonding Mode: IEEE 802.3ad Dynamic link aggregation
MII Status: up
MII Polling Interval (ms): 100

Slave Interface: eth0
MII Status: up
Speed: 10000 Mbps

Slave Interface: eth1
MII Status: down
Speed: 10000 Mbps
",
        );

        fs
    }
}
