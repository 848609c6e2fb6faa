//! The grain and sequence comparators.
//!
//! The walk is an exhaustive, schema-driven traversal of the grain
//! attribute tree: common header fields first, then the fields of the
//! payload variant, then the data region. Attribute paths mirror the
//! model's field names (`origin_timestamp`, `format`, `components[1].stride`,
//! `data`, ...), which is what the option engine matches against.

use crate::diff::DiffNode;
use crate::options::CompareOptions;
use crate::psnr::compute_planar_psnr;
use gsf_core::{Grain, GrainData, GrainPayload, GrainTimestamp, TimeLabel};
use std::fmt::Display;
use tracing::debug;

fn scalar<T: PartialEq + Display>(
    path: &str,
    a: T,
    b: T,
    options: &CompareOptions,
) -> DiffNode {
    if options.is_excluded(path) {
        return DiffNode::Excluded {
            path: path.to_string(),
            a: a.to_string(),
            b: b.to_string(),
        };
    }
    if a == b {
        DiffNode::Equal {
            path: path.to_string(),
            rendered: a.to_string(),
        }
    } else {
        DiffNode::Different {
            path: path.to_string(),
            a: Some(a.to_string()),
            b: Some(b.to_string()),
            reason: "no match".to_string(),
        }
    }
}

/// Compares a signed difference (`a - b`) against the expected-difference
/// options for the path, defaulting to "must be zero".
fn difference(
    path: &str,
    diff: i128,
    rendered_a: String,
    rendered_b: String,
    unit: &str,
    options: &CompareOptions,
) -> DiffNode {
    if options.is_excluded(path) {
        return DiffNode::Excluded {
            path: path.to_string(),
            a: rendered_a,
            b: rendered_b,
        };
    }
    let expectations: Vec<_> = options.expected_for(path).collect();
    if expectations.is_empty() {
        if diff == 0 {
            DiffNode::Equal {
                path: path.to_string(),
                rendered: rendered_a,
            }
        } else {
            DiffNode::Different {
                path: path.to_string(),
                a: Some(rendered_a),
                b: Some(rendered_b),
                reason: format!("a - b == {}{}, expected 0", diff, unit),
            }
        }
    } else if expectations
        .iter()
        .all(|e| e.op.eval(diff, e.value))
    {
        DiffNode::Equal {
            path: path.to_string(),
            rendered: format!("a - b == {}{}, meets requirements", diff, unit),
        }
    } else {
        DiffNode::Different {
            path: path.to_string(),
            a: Some(rendered_a),
            b: Some(rendered_b),
            reason: format!("a - b == {}{}, does not meet requirements", diff, unit),
        }
    }
}

fn timestamp(
    path: &str,
    a: &GrainTimestamp,
    b: &GrainTimestamp,
    options: &CompareOptions,
) -> DiffNode {
    difference(
        path,
        a.offset_from(b),
        a.to_string(),
        b.to_string(),
        "ns",
        options,
    )
}

fn timelabels(a: &[TimeLabel], b: &[TimeLabel], options: &CompareOptions) -> DiffNode {
    let path = "timelabels";
    if options.is_excluded(path) {
        return DiffNode::Excluded {
            path: path.to_string(),
            a: format!("{} labels", a.len()),
            b: format!("{} labels", b.len()),
        };
    }

    let mut children = vec![scalar("timelabels.len", a.len(), b.len(), options)];
    for (n, (la, lb)) in a.iter().zip(b.iter()).enumerate() {
        let mut label_children = vec![
            scalar(
                &format!("timelabels[{}].tag", n),
                &la.tag,
                &lb.tag,
                options,
            ),
            scalar(
                &format!("timelabels[{}].frames_since_midnight", n),
                la.timecode.frames_since_midnight,
                lb.timecode.frames_since_midnight,
                options,
            ),
            scalar(
                &format!("timelabels[{}].rate", n),
                la.timecode.rate,
                lb.timecode.rate,
                options,
            ),
        ];
        label_children.push(scalar(
            &format!("timelabels[{}].drop_frame", n),
            la.timecode.drop_frame,
            lb.timecode.drop_frame,
            options,
        ));
        children.push(DiffNode::Group {
            path: format!("timelabels[{}]", n),
            reason: None,
            children: label_children,
        });
    }
    for (n, label) in a.iter().enumerate().skip(b.len()) {
        children.push(DiffNode::Different {
            path: format!("timelabels[{}]", n),
            a: Some(format!("{:?}", label.tag)),
            b: None,
            reason: "label missing from b".to_string(),
        });
    }
    for (n, label) in b.iter().enumerate().skip(a.len()) {
        children.push(DiffNode::Different {
            path: format!("timelabels[{}]", n),
            a: None,
            b: Some(format!("{:?}", label.tag)),
            reason: "label missing from a".to_string(),
        });
    }
    DiffNode::Group {
        path: path.to_string(),
        reason: None,
        children,
    }
}

/// Renders a data region without touching lazy handles.
fn render_data(data: &GrainData) -> String {
    match data {
        GrainData::Materialized(bytes) => format!("<{} bytes>", bytes.len()),
        GrainData::Lazy(lazy) => format!("<lazy {} bytes>", lazy.length),
    }
}

fn data_node(a: &Grain, b: &Grain, formats_match: bool, options: &CompareOptions) -> DiffNode {
    let path = "data".to_string();

    // Excluded data is bypassed entirely; lazy handles are never read.
    if options.is_excluded(&path) && options.psnr_for(&path).is_none() {
        return DiffNode::Excluded {
            path,
            a: format!("{} (comparison bypassed)", render_data(&a.data)),
            b: render_data(&b.data),
        };
    }

    if !formats_match {
        return DiffNode::Different {
            path,
            a: Some(render_data(&a.data)),
            b: Some(render_data(&b.data)),
            reason: "payload formats do not match".to_string(),
        };
    }

    if let Some(req) = options.psnr_for(&path) {
        if options.is_excluded(&path) {
            return DiffNode::Excluded {
                path,
                a: format!("{} (PSNR bypassed)", render_data(&a.data)),
                b: render_data(&b.data),
            };
        }
        let video = match (&a.payload, &b.payload) {
            (GrainPayload::Video(va), GrainPayload::Video(_)) => va,
            _ => {
                return DiffNode::Different {
                    path,
                    a: Some(render_data(&a.data)),
                    b: Some(render_data(&b.data)),
                    reason: "PSNR comparison is not supported for this payload".to_string(),
                }
            }
        };
        let (Some(bytes_a), Some(bytes_b)) = (a.data.bytes(), b.data.bytes()) else {
            return DiffNode::Different {
                path,
                a: Some(render_data(&a.data)),
                b: Some(render_data(&b.data)),
                reason: "data region is lazy; load it before a PSNR comparison".to_string(),
            };
        };
        return match compute_planar_psnr(bytes_a, bytes_b, video) {
            Ok(psnr) => {
                debug!(?psnr, "computed data PSNR");
                let satisfied = psnr
                    .iter()
                    .zip(&req.thresholds)
                    .all(|(value, threshold)| req.op.eval(*value, *threshold));
                let rendered = format!(
                    "PSNR == {:?}, required {} {:?}",
                    psnr, req.op, req.thresholds
                );
                if satisfied {
                    DiffNode::Equal { path, rendered }
                } else {
                    DiffNode::Different {
                        path,
                        a: Some(render_data(&a.data)),
                        b: Some(render_data(&b.data)),
                        reason: rendered,
                    }
                }
            }
            Err(err) => DiffNode::Different {
                path,
                a: Some(render_data(&a.data)),
                b: Some(render_data(&b.data)),
                reason: err.to_string(),
            },
        };
    }

    let (Some(bytes_a), Some(bytes_b)) = (a.data.bytes(), b.data.bytes()) else {
        return DiffNode::Different {
            path,
            a: Some(render_data(&a.data)),
            b: Some(render_data(&b.data)),
            reason: "data region is lazy; load it before comparing".to_string(),
        };
    };

    if bytes_a == bytes_b {
        return DiffNode::Equal {
            path,
            rendered: format!("<{} bytes equal>", bytes_a.len()),
        };
    }
    let reason = match bytes_a
        .iter()
        .zip(bytes_b.iter())
        .position(|(x, y)| x != y)
    {
        Some(index) => format!(
            "first difference at byte {}: a[{0}] == {}, b[{0}] == {}",
            index, bytes_a[index], bytes_b[index]
        ),
        None => format!(
            "lengths differ: a == {} bytes, b == {} bytes",
            bytes_a.len(),
            bytes_b.len()
        ),
    };
    DiffNode::Different {
        path,
        a: Some(render_data(&a.data)),
        b: Some(render_data(&b.data)),
        reason,
    }
}

fn variant_children(a: &Grain, b: &Grain, options: &CompareOptions) -> Vec<DiffNode> {
    match (&a.payload, &b.payload) {
        (GrainPayload::Empty, GrainPayload::Empty) => Vec::new(),
        (GrainPayload::Video(va), GrainPayload::Video(vb)) => {
            let mut children = vec![
                scalar("format", va.format.name(), vb.format.name(), options),
                scalar("layout", va.layout.name(), vb.layout.name(), options),
                scalar("width", va.width, vb.width, options),
                scalar("height", va.height, vb.height, options),
                scalar("extension", va.extension, vb.extension, options),
                scalar("aspect_ratio", va.aspect_ratio, vb.aspect_ratio, options),
                scalar(
                    "pixel_aspect_ratio",
                    va.pixel_aspect_ratio,
                    vb.pixel_aspect_ratio,
                    options,
                ),
            ];

            let mut comp_children =
                vec![scalar("components.len", va.components.len(), vb.components.len(), options)];
            for (n, (ca, cb)) in va.components.iter().zip(vb.components.iter()).enumerate() {
                comp_children.push(DiffNode::Group {
                    path: format!("components[{}]", n),
                    reason: None,
                    children: vec![
                        scalar(&format!("components[{}].width", n), ca.width, cb.width, options),
                        scalar(
                            &format!("components[{}].height", n),
                            ca.height,
                            cb.height,
                            options,
                        ),
                        scalar(
                            &format!("components[{}].stride", n),
                            ca.stride,
                            cb.stride,
                            options,
                        ),
                        scalar(
                            &format!("components[{}].length", n),
                            ca.length,
                            cb.length,
                            options,
                        ),
                    ],
                });
            }
            children.push(DiffNode::Group {
                path: "components".to_string(),
                reason: None,
                children: comp_children,
            });
            children
        }
        (GrainPayload::CodedVideo(ca), GrainPayload::CodedVideo(cb)) => {
            let mut children = vec![
                scalar("format", ca.format.name(), cb.format.name(), options),
                scalar("layout", ca.layout.name(), cb.layout.name(), options),
                scalar("origin_width", ca.origin_width, cb.origin_width, options),
                scalar("origin_height", ca.origin_height, cb.origin_height, options),
                scalar("coded_width", ca.coded_width, cb.coded_width, options),
                scalar("coded_height", ca.coded_height, cb.coded_height, options),
                scalar("key_frame", ca.key_frame, cb.key_frame, options),
                scalar(
                    "temporal_offset",
                    ca.temporal_offset,
                    cb.temporal_offset,
                    options,
                ),
            ];

            let mut unof_children = vec![scalar(
                "unit_offsets.len",
                ca.unit_offsets.len(),
                cb.unit_offsets.len(),
                options,
            )];
            for (n, (ua, ub)) in ca.unit_offsets.iter().zip(cb.unit_offsets.iter()).enumerate() {
                unof_children.push(difference(
                    &format!("unit_offsets[{}]", n),
                    *ua as i128 - *ub as i128,
                    ua.to_string(),
                    ub.to_string(),
                    "",
                    options,
                ));
            }
            children.push(DiffNode::Group {
                path: "unit_offsets".to_string(),
                reason: None,
                children: unof_children,
            });
            children
        }
        (GrainPayload::Audio(aa), GrainPayload::Audio(ab)) => vec![
            scalar("format", aa.format.name(), ab.format.name(), options),
            scalar("channels", aa.channels, ab.channels, options),
            scalar("samples", aa.samples, ab.samples, options),
            scalar("sample_rate", aa.sample_rate, ab.sample_rate, options),
        ],
        (GrainPayload::CodedAudio(aa), GrainPayload::CodedAudio(ab)) => vec![
            scalar("format", aa.format.name(), ab.format.name(), options),
            scalar("channels", aa.channels, ab.channels, options),
            scalar("samples", aa.samples, ab.samples, options),
            scalar("sample_rate", aa.sample_rate, ab.sample_rate, options),
            scalar("priming", aa.priming, ab.priming, options),
            scalar("remainder", aa.remainder, ab.remainder, options),
        ],
        (GrainPayload::Event(ea), GrainPayload::Event(eb)) => vec![scalar(
            "event_type",
            ea.event_type,
            eb.event_type,
            options,
        )],
        _ => Vec::new(),
    }
}

fn payload_formats_match(a: &Grain, b: &Grain) -> bool {
    match (&a.payload, &b.payload) {
        (GrainPayload::Video(va), GrainPayload::Video(vb)) => va.format == vb.format,
        (GrainPayload::CodedVideo(ca), GrainPayload::CodedVideo(cb)) => ca.format == cb.format,
        (GrainPayload::Audio(aa), GrainPayload::Audio(ab)) => aa.format == ab.format,
        (GrainPayload::CodedAudio(aa), GrainPayload::CodedAudio(ab)) => aa.format == ab.format,
        (GrainPayload::Empty, GrainPayload::Empty) => true,
        (GrainPayload::Event(_), GrainPayload::Event(_)) => true,
        _ => false,
    }
}

fn compare_grain_at(root_path: &str, a: &Grain, b: &Grain, options: &CompareOptions) -> DiffNode {
    let types_match = a.grain_type() == b.grain_type();

    let mut children = vec![
        scalar("grain_type", a.grain_type(), b.grain_type(), options),
        scalar("source_id", a.header.source_id, b.header.source_id, options),
        scalar("flow_id", a.header.flow_id, b.header.flow_id, options),
        timestamp(
            "origin_timestamp",
            &a.header.origin_timestamp,
            &b.header.origin_timestamp,
            options,
        ),
        timestamp(
            "sync_timestamp",
            &a.header.sync_timestamp,
            &b.header.sync_timestamp,
            options,
        ),
        timestamp(
            "creation_timestamp",
            &a.header.creation_timestamp,
            &b.header.creation_timestamp,
            options,
        ),
        scalar("rate", a.header.rate, b.header.rate, options),
        scalar("duration", a.header.duration, b.header.duration, options),
        scalar("length", a.length(), b.length(), options),
        timelabels(&a.header.timelabels, &b.header.timelabels, options),
    ];

    let reason = if types_match {
        children.extend(variant_children(a, b, options));
        children.push(data_node(a, b, payload_formats_match(a, b), options));
        None
    } else {
        children.push(DiffNode::Different {
            path: "data".to_string(),
            a: Some(render_data(&a.data)),
            b: Some(render_data(&b.data)),
            reason: "grain types do not match".to_string(),
        });
        Some(format!(
            "grain types do not match: a is {}, b is {}",
            a.grain_type(),
            b.grain_type()
        ))
    };

    DiffNode::Group {
        path: root_path.to_string(),
        reason,
        children,
    }
}

/// Compares two grains, producing the full diff tree.
pub fn compare_grain(a: &Grain, b: &Grain, options: &CompareOptions) -> DiffNode {
    compare_grain_at("grain", a, b, options)
}

/// The result of comparing two grain sequences.
#[derive(Debug, Clone)]
pub struct SequenceDiff {
    /// True when both sequences matched and ended together.
    pub verdict: bool,
    /// Number of pairwise grain comparisons performed.
    pub compared: usize,
    pub message: String,
    /// Per-index diff trees. With `return_last_only` only the most
    /// recent diff is retained.
    pub diffs: Vec<DiffNode>,
}

impl SequenceDiff {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(if self.verdict { "\u{2705}   " } else { "\u{274C}   " });
        out.push_str(&self.message);
        out.push('\n');
        for diff in &self.diffs {
            out.push_str(&diff.render());
        }
        out
    }
}

fn grain_summary(grain: &Grain) -> String {
    format!("{} grain ({} bytes)", grain.grain_type(), grain.length())
}

/// Compares two grain sequences pairwise, stopping at the first mismatch.
///
/// When one sequence ends early, the excess entry becomes a one-sided
/// mismatch node and the verdict is failure. With `return_last_only` only
/// the most recent per-index diff is retained, bounding memory.
pub fn compare_sequences<A, B>(
    a: A,
    b: B,
    options: &CompareOptions,
    return_last_only: bool,
) -> SequenceDiff
where
    A: IntoIterator<Item = Grain>,
    B: IntoIterator<Item = Grain>,
{
    let mut iter_a = a.into_iter();
    let mut iter_b = b.into_iter();

    let mut compared = 0usize;
    let mut diffs: Vec<DiffNode> = Vec::new();
    let mut push = |diffs: &mut Vec<DiffNode>, node: DiffNode| {
        if return_last_only {
            diffs.clear();
        }
        diffs.push(node);
    };

    loop {
        match (iter_a.next(), iter_b.next()) {
            (None, None) => {
                return SequenceDiff {
                    verdict: true,
                    compared,
                    message: format!("sequences match with length {}", compared),
                    diffs,
                };
            }
            (Some(grain_a), None) => {
                push(
                    &mut diffs,
                    DiffNode::Different {
                        path: format!("grains[{}]", compared),
                        a: Some(grain_summary(&grain_a)),
                        b: None,
                        reason: "sequence b ended".to_string(),
                    },
                );
                return SequenceDiff {
                    verdict: false,
                    compared,
                    message: format!("sequences differ first at entry {}", compared),
                    diffs,
                };
            }
            (None, Some(grain_b)) => {
                push(
                    &mut diffs,
                    DiffNode::Different {
                        path: format!("grains[{}]", compared),
                        a: None,
                        b: Some(grain_summary(&grain_b)),
                        reason: "sequence a ended".to_string(),
                    },
                );
                return SequenceDiff {
                    verdict: false,
                    compared,
                    message: format!("sequences differ first at entry {}", compared),
                    diffs,
                };
            }
            (Some(grain_a), Some(grain_b)) => {
                let index = compared;
                let node = compare_grain_at(
                    &format!("grains[{}]", index),
                    &grain_a,
                    &grain_b,
                    options,
                );
                compared += 1;
                let failed = !node.verdict();
                push(&mut diffs, node);
                if failed {
                    return SequenceDiff {
                        verdict: false,
                        compared,
                        message: format!("sequences differ first at entry {}", index),
                        diffs,
                    };
                }
            }
        }
    }
}
