//! Gateway analyzer (C3): direction classification, loop and SESE pairing,
//! inclusive-path annotation, and structural precondition checks.
//!
//! Ported from the reference `BPMNAnalyzer` (`bpmn2dcr.py`), which is the
//! pipeline spec §9 names as the one a faithful reimplementation should
//! follow, rather than the simpler vestigial `BPMNParser`/`DCRBuilder` pair
//! in `bpmn2dcr_core.py`.

use std::collections::{HashSet, VecDeque};

use crate::model::{BpmnGraph, ElementKind, GatewayDirection, GatewayType, LoopType};

/// §3.2 / §4.1.1 — derive each gateway's direction from flow counts.
/// Idempotent: safe to call again after further mutation.
pub fn classify_directions(graph: &mut BpmnGraph) {
    let ids = graph.element_ids_sorted();
    for id in ids {
        let (is_gateway, in_deg, out_deg) = {
            let el = graph.element(&id).expect("id from element_ids_sorted exists");
            (el.kind.is_gateway(), el.in_degree(), el.out_degree())
        };
        if !is_gateway {
            continue;
        }
        let direction = match (in_deg, out_deg) {
            (1, o) if o > 1 => GatewayDirection::Split,
            (i, 1) if i > 1 => GatewayDirection::Join,
            (1, 1) => GatewayDirection::RoutingDecisionPoint,
            _ => GatewayDirection::UndefinedOrComplex,
        };
        graph.element_mut(&id).unwrap().direction = Some(direction);
    }
}

/// §4.1.5 — bounded-depth BFS reachability with an avoid-set.
fn path_exists(graph: &BpmnGraph, start: &str, end: &str, avoid: &HashSet<String>, max_depth: u32) -> bool {
    if start == end {
        return true;
    }
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.to_string());
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    queue.push_back((start.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for succ in graph.successors(&current) {
            if succ == end {
                return true;
            }
            if !visited.contains(&succ) && !avoid.contains(&succ) {
                visited.insert(succ.clone());
                queue.push_back((succ, depth + 1));
            }
        }
    }
    false
}

const MAX_BFS_DEPTH: u32 = 30;

/// §4.1.3 — test whether (j_entry, s_cond) forms an admissible loop
/// candidate, and if so, return its body node set.
fn check_loop_pairing_candidate(graph: &BpmnGraph, j_entry_id: &str, s_cond_id: &str) -> Option<HashSet<String>> {
    let j_gw = graph.element(j_entry_id)?;
    let s_gw = graph.element(s_cond_id)?;

    let is_candidate_shape = j_gw.kind == ElementKind::ExclusiveGateway
        && s_gw.kind == ElementKind::ExclusiveGateway
        && j_gw.direction == Some(GatewayDirection::Join)
        && s_gw.direction == Some(GatewayDirection::Split)
        && j_gw.paired_gateway_id.is_none()
        && s_gw.paired_gateway_id.is_none();
    if !is_candidate_shape {
        return None;
    }

    // 1. J has exactly one successor B (the body entry).
    let j_succs = graph.successors(j_entry_id);
    if j_succs.len() != 1 {
        return None;
    }
    let body_entry = j_succs[0].clone();

    // 2. A path from B to S exists that does not traverse J.
    let avoid_j: HashSet<String> = [j_entry_id.to_string()].into_iter().collect();
    if !path_exists(graph, &body_entry, s_cond_id, &avoid_j, MAX_BFS_DEPTH) {
        return None;
    }

    let s_succs = graph.successors(s_cond_id);
    if s_succs.len() < 2 {
        return None;
    }

    // 3. At least one branch of S reaches J without traversing S (back-edge).
    let avoid_s: HashSet<String> = [s_cond_id.to_string()].into_iter().collect();
    let has_back_edge = s_succs
        .iter()
        .any(|branch| path_exists(graph, branch, j_entry_id, &avoid_s, MAX_BFS_DEPTH));
    if !has_back_edge {
        return None;
    }

    // 4. At least one branch of S does not reach J while avoiding S (exit branch).
    let has_exit_branch = s_succs.iter().any(|branch| {
        !path_exists(graph, branch, j_entry_id, &avoid_s, MAX_BFS_DEPTH)
            && (branch == j_entry_id || !path_exists(graph, branch, s_cond_id, &avoid_j, MAX_BFS_DEPTH))
    });
    if !has_exit_branch {
        return None;
    }

    // Body = nodes reachable from B treating S as a sink (may enter S, not leave it).
    let mut body_nodes: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = [j_entry_id.to_string(), body_entry.clone()].into_iter().collect();
    if body_entry != s_cond_id {
        body_nodes.insert(body_entry.clone());
    }
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(body_entry);

    while let Some(current) = queue.pop_front() {
        if current == s_cond_id {
            continue;
        }
        for succ in graph.successors(&current) {
            if !visited.contains(&succ) {
                visited.insert(succ.clone());
                if succ != s_cond_id {
                    body_nodes.insert(succ.clone());
                }
                queue.push_back(succ);
            }
        }
    }

    Some(body_nodes)
}

/// §4.1.4 — validate every branch from `s_gw_id` reaches `j_gw_id` cleanly
/// (no same-type unpaired structural gateway along the way, no revisits),
/// returning the union of intermediate nodes and whether the region is
/// "clean" in the §4.1.4 sense.
fn region_nodes_and_cleanliness(graph: &BpmnGraph, s_gw_id: &str, j_gw_id: &str) -> Option<(HashSet<String>, bool)> {
    let s_gw = graph.element(s_gw_id)?;
    let s_type = s_gw.kind.gateway_type()?;
    let s_successors = graph.successors(s_gw_id);
    if s_successors.is_empty() {
        return None;
    }

    let is_same_type_unpaired_structural = |graph: &BpmnGraph, node_id: &str| -> bool {
        let Some(el) = graph.element(node_id) else {
            return false;
        };
        el.kind.is_gateway()
            && el.kind.gateway_type() == Some(s_type)
            && el.paired_gateway_id.is_none()
            && matches!(
                el.direction,
                Some(GatewayDirection::Split) | Some(GatewayDirection::Join)
            )
    };

    let mut region_nodes: HashSet<String> = HashSet::new();

    for branch_start in &s_successors {
        let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
        queue.push_back((branch_start.clone(), vec![s_gw_id.to_string(), branch_start.clone()]));
        let mut visited: HashSet<String> = [s_gw_id.to_string()].into_iter().collect();
        let mut reached_join = false;

        while let Some((current, path)) = queue.pop_front() {
            if current == j_gw_id {
                reached_join = true;
                for node in &path[1..path.len() - 1] {
                    region_nodes.insert(node.clone());
                }
                break;
            }

            if current != s_gw_id && current != j_gw_id && is_same_type_unpaired_structural(graph, &current) {
                return None;
            }

            if current != s_gw_id && current != j_gw_id {
                region_nodes.insert(current.clone());
            }

            for succ in graph.successors(&current) {
                if path.contains(&succ) {
                    return None;
                }
                if succ == j_gw_id || !visited.contains(&succ) {
                    if succ != j_gw_id {
                        visited.insert(succ.clone());
                    }
                    let mut next_path = path.clone();
                    next_path.push(succ.clone());
                    queue.push_back((succ, next_path));
                }
            }
        }

        if !reached_join {
            return None;
        }
    }

    let is_clean = !region_nodes
        .iter()
        .any(|id| is_same_type_unpaired_structural(graph, id));

    Some((region_nodes, is_clean))
}

/// §4.1.2–4.1.4 — fixpoint pairing. Each pass tries loop-pairing first, then
/// SESE-pairing, committing the single smallest admissible candidate;
/// repeats until a pass makes no progress.
pub fn pair_gateways(graph: &mut BpmnGraph) {
    classify_directions(graph);

    loop {
        if try_commit_smallest_loop_pair(graph) {
            continue;
        }
        if try_commit_smallest_sese_pair(graph) {
            continue;
        }
        break;
    }

    annotate_inclusive_paths(graph);
}

fn unpaired_gateways_with(
    graph: &BpmnGraph,
    direction: GatewayDirection,
    kind: Option<ElementKind>,
    exclude_looped: bool,
) -> Vec<String> {
    let mut ids: Vec<String> = graph
        .elements()
        .filter(|el| {
            el.kind.is_gateway()
                && el.direction == Some(direction)
                && el.paired_gateway_id.is_none()
                && (!exclude_looped || el.loop_type.is_none())
                && kind.map(|k| k == el.kind).unwrap_or(true)
        })
        .map(|el| el.id.clone())
        .collect();
    ids.sort();
    ids
}

fn try_commit_smallest_loop_pair(graph: &mut BpmnGraph) -> bool {
    let joins = unpaired_gateways_with(
        graph,
        GatewayDirection::Join,
        Some(ElementKind::ExclusiveGateway),
        false,
    );
    let splits = unpaired_gateways_with(
        graph,
        GatewayDirection::Split,
        Some(ElementKind::ExclusiveGateway),
        false,
    );

    let mut candidates: Vec<(String, String, usize)> = Vec::new();
    for j in &joins {
        for s in &splits {
            if j == s {
                continue;
            }
            if let Some(body) = check_loop_pairing_candidate(graph, j, s) {
                let contains_unpaired_structural = body.iter().any(|node_id| {
                    graph
                        .element(node_id)
                        .map(|el| {
                            el.kind.is_gateway()
                                && el.paired_gateway_id.is_none()
                                && matches!(
                                    el.direction,
                                    Some(GatewayDirection::Split) | Some(GatewayDirection::Join)
                                )
                        })
                        .unwrap_or(false)
                });
                if !contains_unpaired_structural {
                    candidates.push((j.clone(), s.clone(), body.len()));
                }
            }
        }
    }

    if candidates.is_empty() {
        return false;
    }
    candidates.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));
    let (j_id, s_id, body_len) = candidates.into_iter().next().unwrap();

    tracing::debug!(join = %j_id, split = %s_id, body_nodes = body_len, "committing loop pair");

    let j = graph.element_mut(&j_id).unwrap();
    j.paired_gateway_id = Some(s_id.clone());
    j.loop_type = Some(LoopType::LoopEntryJoin);
    let s = graph.element_mut(&s_id).unwrap();
    s.paired_gateway_id = Some(j_id);
    s.loop_type = Some(LoopType::LoopConditionSplit);
    true
}

fn try_commit_smallest_sese_pair(graph: &mut BpmnGraph) -> bool {
    let splits = unpaired_gateways_with(graph, GatewayDirection::Split, None, true);

    let mut candidates: Vec<(String, String, usize)> = Vec::new();
    for s in &splits {
        let s_type = graph.element(s).unwrap().kind.gateway_type();
        let joins: Vec<String> = unpaired_gateways_with(graph, GatewayDirection::Join, None, true)
            .into_iter()
            .filter(|j| graph.element(j).unwrap().kind.gateway_type() == s_type)
            .collect();
        for j in &joins {
            if s == j {
                continue;
            }
            if let Some((region, is_clean)) = region_nodes_and_cleanliness(graph, s, j) {
                if is_clean {
                    candidates.push((s.clone(), j.clone(), region.len()));
                }
            }
        }
    }

    if candidates.is_empty() {
        return false;
    }
    candidates.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));
    let (s_id, j_id, region_len) = candidates.into_iter().next().unwrap();

    tracing::debug!(split = %s_id, join = %j_id, region_nodes = region_len, "committing SESE pair");

    graph.element_mut(&s_id).unwrap().paired_gateway_id = Some(j_id.clone());
    graph.element_mut(&j_id).unwrap().paired_gateway_id = Some(s_id);
    true
}

/// §4.1.6 — for every inclusive split paired with a join, trace each branch
/// forward and record, on the first predecessor-of-join found per branch,
/// the originating outgoing flow id (first-writer-wins).
fn annotate_inclusive_paths(graph: &mut BpmnGraph) {
    let splits: Vec<(String, String, Vec<String>)> = graph
        .elements()
        .filter(|el| {
            el.kind.gateway_type() == Some(GatewayType::Inclusive)
                && el.direction == Some(GatewayDirection::Split)
                && el.paired_gateway_id.is_some()
        })
        .map(|el| {
            (
                el.id.clone(),
                el.paired_gateway_id.clone().unwrap(),
                el.outgoing_flow_ids.clone(),
            )
        })
        .collect();

    for (_split_id, join_id, outgoing_flow_ids) in splits {
        if !graph.contains_element(&join_id) {
            continue;
        }
        for flow_id in outgoing_flow_ids {
            let Some(flow) = graph.sequence_flow(&flow_id) else {
                continue;
            };
            let start = flow.target_ref.clone();
            trace_and_annotate_inclusive_path(graph, &flow_id, &start, &join_id);
        }
    }
}

fn trace_and_annotate_inclusive_path(graph: &mut BpmnGraph, origin_flow_id: &str, start_id: &str, paired_join_id: &str) {
    if !graph.contains_element(start_id) {
        return;
    }

    let mut visited: HashSet<String> = [start_id.to_string()].into_iter().collect();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(start_id.to_string());

    while let Some(current_id) = queue.pop_front() {
        let Some(current) = graph.element(&current_id) else {
            continue;
        };

        let is_direct_predecessor_of_join = current
            .outgoing_flow_ids
            .iter()
            .filter_map(|fid| graph.sequence_flow(fid))
            .any(|flow| flow.target_ref == paired_join_id);

        if is_direct_predecessor_of_join {
            let el = graph.element_mut(&current_id).unwrap();
            if el.inclusive_path_origin_flow_id.is_none() {
                el.inclusive_path_origin_flow_id = Some(origin_flow_id.to_string());
            }
        }

        if current_id == paired_join_id {
            continue;
        }

        for succ in graph.successors(&current_id) {
            if !visited.contains(&succ) {
                visited.insert(succ.clone());
                queue.push_back(succ);
            }
        }
    }
}

/// §4.1.7 — structural precondition checks, run after pairing. All failures
/// are collected; returns `Ok(())` when every check passes, else `Err` with
/// human-readable bulleted messages in the stable order §6.3 specifies.
pub fn precondition_checks(graph: &BpmnGraph) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    let start_events: Vec<&crate::model::Element> = graph
        .elements()
        .filter(|el| el.kind == ElementKind::StartEvent)
        .collect();
    if start_events.len() != 1 {
        errors.push(format!("● Expected 1 Start Event, found {}.", start_events.len()));
    } else {
        let se = start_events[0];
        if se.in_degree() != 0 {
            errors.push("● Start Event must have 0 incoming flows.".to_string());
        }
        if se.out_degree() != 1 {
            errors.push("● Start Event must have 1 outgoing flow.".to_string());
        }
    }

    let end_events: Vec<&crate::model::Element> = graph
        .elements()
        .filter(|el| el.kind == ElementKind::EndEvent)
        .collect();
    if end_events.is_empty() {
        errors.push("● Expected at least 1 End Event, found 0.".to_string());
    } else {
        if end_events.iter().any(|e| e.in_degree() != 1) {
            errors.push("● Each End Event must have 1 incoming flow.".to_string());
        }
        if end_events.iter().any(|e| e.out_degree() != 0) {
            errors.push("● Each End Event must have 0 outgoing flows.".to_string());
        }
    }

    let mut gateway_ids = graph.element_ids_sorted();
    gateway_ids.retain(|id| graph.element(id).unwrap().kind.is_gateway());

    let mut first_invalid_flow_example: Option<(usize, usize)> = None;
    let mut any_unpaired_structural = false;
    for id in &gateway_ids {
        let el = graph.element(id).unwrap();
        let is_valid_split = el.in_degree() == 1 && el.out_degree() > 1;
        let is_valid_join = el.in_degree() > 1 && el.out_degree() == 1;
        if !is_valid_split && !is_valid_join {
            first_invalid_flow_example.get_or_insert((el.in_degree(), el.out_degree()));
        }
        if (is_valid_split || is_valid_join) && el.kind.gateway_type().map(|t| matches!(t, GatewayType::Parallel | GatewayType::Exclusive | GatewayType::Inclusive)).unwrap_or(false) && !el.is_paired_or_looped()
        {
            any_unpaired_structural = true;
        }
    }
    if let Some((i, o)) = first_invalid_flow_example {
        errors.push(format!("● A gateway has invalid flow counts (In: {i}, Out: {o})."));
    }
    if any_unpaired_structural {
        errors.push(
            "● One or more structural gateways (Exclusive, Parallel, Inclusive) are not correctly paired or part of a loop."
                .to_string(),
        );
    }

    let task_like_invalid = graph.elements().any(|el| {
        !el.kind.is_gateway()
            && el.kind != ElementKind::StartEvent
            && el.kind != ElementKind::EndEvent
            && !(el.in_degree() == 1 && el.out_degree() == 1)
    });
    if task_like_invalid {
        errors.push("● Tasks must have exactly 1 incoming and 1 outgoing flow.".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
