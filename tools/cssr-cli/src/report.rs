//! Pretty renderers for decoded messages, shared by the reader tools.

use gnss_ssr::b2b::B2bMessage;
use gnss_ssr::cssr::{signal_name, CssrBody, CssrMessage, SubframeOutput};
use gnss_ssr::has::HasMessage;
use gnss_ssr::rtcm::{RtcmMessage, SsrKind};

use crate::geodesy;
use crate::render::Style;

fn fmt_opt(v: Option<f64>, precision: usize, unit: &str) -> String {
    match v {
        Some(v) => format!("{v:.precision$}{unit}"),
        None => "invalid".to_string(),
    }
}

/// One-line summary of a decoded RTCM message.
pub fn rtcm_summary(msg: &RtcmMessage, style: &Style) -> String {
    match msg {
        RtcmMessage::Msm(m) => {
            let mut line = format!(
                "RTCM {} {} {}",
                m.msg_type,
                m.constellation.letter(),
                style.kind(&format!("MSM{}", m.msm)),
            );
            for sat in &m.satellites {
                let name = format!("{}{:02}", m.constellation.letter(), sat.id);
                line.push(' ');
                line.push_str(&style.sat(&name));
            }
            line
        },
        RtcmMessage::Ssr(s) => format!("RTCM {}({})", s.msg_type, s.n_sat()),
        RtcmMessage::ReferenceStation(r) => {
            format!("RTCM 1005 {}", geodesy::format_llh(r.x, r.y, r.z))
        },
        RtcmMessage::AntennaDescriptor(a) => {
            let mut line = format!("RTCM {} {}", a.msg_type, a.antenna);
            if let Some(rx) = &a.receiver {
                line.push_str(&format!(" {rx}"));
            }
            line
        },
        RtcmMessage::Ephemeris(e) => {
            format!("RTCM ephemeris {}", style.sat(&e.sat().to_string()))
        },
        RtcmMessage::CssrEnvelope { payload } => {
            format!("RTCM 4073 {} ({} bytes)", style.kind("CSSR"), payload.len())
        },
        RtcmMessage::Unknown { msg_type, payload } => {
            format!("RTCM {msg_type} ({} bytes)", payload.len())
        },
    }
}

/// Per-satellite detail of an SSR message, for `-t 1`.
pub fn ssr_detail(kind: &SsrKind) -> Vec<String> {
    match kind {
        SsrKind::Orbit(orbits) => orbits
            .iter()
            .map(|o| {
                format!(
                    "  {} IODE={} d_radial={} d_along={} d_cross={}",
                    o.sat,
                    o.iode,
                    fmt_opt(o.radial, 4, "m"),
                    fmt_opt(o.along, 4, "m"),
                    fmt_opt(o.cross, 4, "m"),
                )
            })
            .collect(),
        SsrKind::Clock(clocks) => clocks
            .iter()
            .map(|c| format!("  {} c0={}", c.sat, fmt_opt(c.c0, 4, "m")))
            .collect(),
        SsrKind::CodeBias(biases) => biases
            .iter()
            .map(|b| format!("  {} sig{} {}", b.sat, b.signal, fmt_opt(b.bias, 2, "m")))
            .collect(),
        SsrKind::CombinedOrbitClock(orbits, clocks) => {
            let mut lines = ssr_detail(&SsrKind::Orbit(orbits.clone()));
            lines.extend(ssr_detail(&SsrKind::Clock(clocks.clone())));
            lines
        },
        SsrKind::Ura(v) => v
            .iter()
            .map(|(s, ura)| format!("  {} URA={}", s, fmt_opt(*ura, 3, "m")))
            .collect(),
        SsrKind::HighRateClock(v) => v
            .iter()
            .map(|(s, c0)| format!("  {} hr_clock={}", s, fmt_opt(*c0, 4, "m")))
            .collect(),
    }
}

/// Render one decoded HAS message as its conventional listing.
pub fn has_lines(msg: &HasMessage, style: &Style) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(mask) = &msg.mask {
        for entry in &mask.entries {
            let mut line = format!("MASK {}", style.sat(&entry.sat.to_string()));
            for sig in &entry.signals {
                line.push(' ');
                line.push_str(signal_name(entry.sat.constellation, *sig));
            }
            lines.push(line);
        }
    }
    for o in &msg.orbits {
        lines.push(format!(
            "ORBIT {} IODE={} d_radial={} d_track={} d_cross={}",
            style.sat(&o.sat.to_string()),
            o.iode,
            fmt_opt(o.radial, 4, "m"),
            fmt_opt(o.along, 4, "m"),
            fmt_opt(o.cross, 4, "m"),
        ));
    }
    for c in &msg.clocks {
        lines.push(format!(
            "CLOCK {} c0={}",
            style.sat(&c.sat.to_string()),
            fmt_opt(c.c0, 4, "m"),
        ));
    }
    for b in &msg.code_biases {
        lines.push(format!(
            "CBIAS {} {} {}",
            style.sat(&b.sat.to_string()),
            signal_name(b.sat.constellation, b.signal),
            fmt_opt(b.bias, 2, "m"),
        ));
    }
    for b in &msg.phase_biases {
        lines.push(format!(
            "PBIAS {} {} {} disc={}",
            style.sat(&b.sat.to_string()),
            signal_name(b.sat.constellation, b.signal),
            fmt_opt(b.bias, 3, "m"),
            b.discontinuity.unwrap_or(0),
        ));
    }
    lines
}

/// Compact "ST1 ST3 ST2" listing of a decoded subframe.
pub fn subtype_listing(out: &SubframeOutput) -> String {
    out.messages
        .iter()
        .map(|m| format!("ST{}", m.subtype))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-subtype detail of a compact SSR message, for `-t 1`.
pub fn cssr_detail(msg: &CssrMessage) -> Vec<String> {
    match &msg.body {
        CssrBody::Mask(mask) => mask
            .entries
            .iter()
            .map(|e| {
                let sigs: Vec<&str> = e
                    .signals
                    .iter()
                    .map(|s| signal_name(e.sat.constellation, *s))
                    .collect();
                format!("  MASK {} {}", e.sat, sigs.join(" "))
            })
            .collect(),
        CssrBody::Orbit(orbits) => orbits
            .iter()
            .map(|o| {
                format!(
                    "  ORBIT {} IODE={} d_radial={} d_along={} d_cross={}",
                    o.sat,
                    o.iode,
                    fmt_opt(o.radial, 4, "m"),
                    fmt_opt(o.along, 4, "m"),
                    fmt_opt(o.cross, 4, "m"),
                )
            })
            .collect(),
        CssrBody::Clock(clocks) => clocks
            .iter()
            .map(|c| format!("  CLOCK {} c0={}", c.sat, fmt_opt(c.c0, 4, "m")))
            .collect(),
        CssrBody::CodeBias(biases) => biases
            .iter()
            .map(|b| {
                format!(
                    "  CBIAS {} {} {}",
                    b.sat,
                    signal_name(b.sat.constellation, b.signal),
                    fmt_opt(b.bias, 2, "m"),
                )
            })
            .collect(),
        CssrBody::PhaseBias(biases) => biases
            .iter()
            .map(|b| {
                format!(
                    "  PBIAS {} {} {} disc={}",
                    b.sat,
                    signal_name(b.sat.constellation, b.signal),
                    fmt_opt(b.bias, 3, "m"),
                    b.discontinuity.unwrap_or(0),
                )
            })
            .collect(),
        CssrBody::Ura(values) => values
            .iter()
            .map(|u| format!("  URA {} {}", u.sat, fmt_opt(u.ura, 3, "m")))
            .collect(),
        CssrBody::Stec { area, polynomials } => polynomials
            .iter()
            .map(|p| {
                let coeffs: Vec<String> =
                    p.coeffs.iter().map(|c| fmt_opt(*c, 3, "")).collect();
                format!("  STEC area={area} {} [{}]", p.sat, coeffs.join(", "))
            })
            .collect(),
        CssrBody::Grid { area, points } => points
            .iter()
            .enumerate()
            .map(|(i, g)| {
                format!(
                    "  GRID area={area} point={i} trop_wet={}",
                    fmt_opt(g.trop_wet, 3, "m")
                )
            })
            .collect(),
        CssrBody::ServiceInfo { counter, data } => {
            vec![format!("  SERVICE counter={counter} {} bytes", data.len())]
        },
        CssrBody::CombinedBias { code, phase, .. } => {
            let mut lines = cssr_detail(&CssrMessage {
                subtype: msg.subtype,
                header: msg.header,
                body: CssrBody::CodeBias(code.clone()),
            });
            lines.extend(cssr_detail(&CssrMessage {
                subtype: msg.subtype,
                header: msg.header,
                body: CssrBody::PhaseBias(phase.clone()),
            }));
            lines
        },
        CssrBody::CombinedOrbitClock { orbit, clock, .. } => {
            let mut lines = cssr_detail(&CssrMessage {
                subtype: msg.subtype,
                header: msg.header,
                body: CssrBody::Orbit(orbit.clone()),
            });
            lines.extend(cssr_detail(&CssrMessage {
                subtype: msg.subtype,
                header: msg.header,
                body: CssrBody::Clock(clock.clone()),
            }));
            lines
        },
        CssrBody::Atmospheric {
            network,
            troposphere,
            grid,
            stec,
        } => {
            let mut lines = vec![format!(
                "  ATMOS network={network} trop={} grid_points={} stec_sats={}",
                troposphere.is_some(),
                grid.len(),
                stec.len(),
            )];
            for p in stec {
                lines.push(format!("    STEC {} c00={}", p.sat, fmt_opt(p.coeffs[0], 3, "")));
            }
            lines
        },
        CssrBody::Ionosphere(polys) => polys
            .iter()
            .map(|p| format!("  IONO {} c00={}", p.sat, fmt_opt(p.coeffs[0], 3, "")))
            .collect(),
    }
}

/// One-line rendering of a B2b message.
pub fn b2b_lines(msg: &B2bMessage, style: &Style) -> Vec<String> {
    match msg {
        B2bMessage::Mask(mask) => {
            let mut line = format!(
                "MT1 mask IODP={} IODSSR={} n_sat={}",
                mask.iodp,
                mask.iodssr,
                mask.sats.len()
            );
            for sat in &mask.sats {
                line.push(' ');
                line.push_str(&style.sat(&sat.to_string()));
            }
            vec![line]
        },
        B2bMessage::Orbit { sats, .. } => sats
            .iter()
            .map(|o| {
                format!(
                    "MT2 {} IODN={} IOD={} d_radial={} d_along={} d_cross={}",
                    style.sat(&o.sat.to_string()),
                    o.iodn,
                    o.iod_corr,
                    fmt_opt(o.radial, 4, "m"),
                    fmt_opt(o.along, 4, "m"),
                    fmt_opt(o.cross, 4, "m"),
                )
            })
            .collect(),
        B2bMessage::CodeBias { biases, .. } => biases
            .iter()
            .map(|b| {
                format!(
                    "MT3 {} sig{} {}",
                    style.sat(&b.sat.to_string()),
                    b.signal,
                    fmt_opt(b.bias, 3, "m"),
                )
            })
            .collect(),
        B2bMessage::Clock { sats, .. } => sats
            .iter()
            .map(|c| {
                format!(
                    "MT4 {} IOD={} clock={}",
                    style.sat(&c.sat.to_string()),
                    c.iod_corr,
                    fmt_opt(c.c0, 3, " m"),
                )
            })
            .collect(),
        B2bMessage::Null => vec!["MT63 null".to_string()],
    }
}
