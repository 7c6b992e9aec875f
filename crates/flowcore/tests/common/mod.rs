//! Shared fixtures for the end-to-end scenarios in spec.md §8: a minimal
//! in-memory `FlowDefinition`/`Task`/`Link`, a two-task-type model, and an
//! echo activity. Not meant to be a reusable test harness beyond this file
//! — each scenario wires its own flow/model out of these building blocks.

use std::collections::HashMap;
use std::sync::Arc;

use flowcore::prelude::*;
use serde_json::Value;

// ---- flow definition -------------------------------------------------

pub struct FixtureTask {
    pub id: String,
    pub name: String,
    pub type_id: String,
    pub parent_id: Option<String>,
    pub child_ids: Vec<String>,
    pub from_link_ids: Vec<String>,
    pub attrs: Vec<Attribute>,
    pub activity_type: String,
    pub input_mapper: Option<Box<dyn Mapper>>,
    pub output_mapper: Option<Box<dyn Mapper>>,
}

impl Task for FixtureTask {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn type_id(&self) -> &str {
        &self.type_id
    }
    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
    fn child_ids(&self) -> &[String] {
        &self.child_ids
    }
    fn from_link_ids(&self) -> &[String] {
        &self.from_link_ids
    }
    fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }
    fn activity_type(&self) -> &str {
        &self.activity_type
    }
    fn input_mapper(&self) -> Option<&dyn Mapper> {
        self.input_mapper.as_deref()
    }
    fn output_mapper(&self) -> Option<&dyn Mapper> {
        self.output_mapper.as_deref()
    }
}

pub struct FixtureLink {
    pub id: String,
    pub from_task_id: String,
    pub to_task_id: String,
}

impl Link for FixtureLink {
    fn id(&self) -> &str {
        &self.id
    }
    fn from_task_id(&self) -> &str {
        &self.from_task_id
    }
    fn to_task_id(&self) -> &str {
        &self.to_task_id
    }
}

pub struct FixtureFlow {
    pub model_id: String,
    pub type_id: String,
    pub name: String,
    pub root_task_id: String,
    pub attrs: Vec<Attribute>,
    pub tasks: HashMap<String, FixtureTask>,
    pub links: HashMap<String, FixtureLink>,
}

impl FlowDefinition for FixtureFlow {
    fn model_id(&self) -> &str {
        &self.model_id
    }
    fn type_id(&self) -> &str {
        &self.type_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn root_task_id(&self) -> &str {
        &self.root_task_id
    }
    fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }
    fn task(&self, task_id: &str) -> Option<&dyn Task> {
        self.tasks.get(task_id).map(|t| t as &dyn Task)
    }
    fn link(&self, link_id: &str) -> Option<&dyn Link> {
        self.links.get(link_id).map(|l| l as &dyn Link)
    }
}

// ---- behavior registry -------------------------------------------------

pub struct FixtureModel {
    pub flow_behaviors: HashMap<String, Arc<dyn FlowBehavior>>,
    pub task_behaviors: HashMap<String, Arc<dyn TaskBehavior>>,
}

impl FlowModel for FixtureModel {
    fn flow_behavior(&self, type_id: &str) -> Option<Arc<dyn FlowBehavior>> {
        self.flow_behaviors.get(type_id).cloned()
    }
    fn task_behavior(&self, type_id: &str) -> Option<Arc<dyn TaskBehavior>> {
        self.task_behaviors.get(type_id).cloned()
    }
}

pub struct FixtureModelRegistry {
    pub model_id: String,
    pub model: Arc<dyn FlowModel>,
}

impl ModelRegistry for FixtureModelRegistry {
    fn model(&self, model_id: &str) -> Option<Arc<dyn FlowModel>> {
        (model_id == self.model_id).then(|| self.model.clone())
    }
}

// ---- activity registry -------------------------------------------------

pub struct EchoActivity {
    metadata: ActivityMetadata,
}

impl EchoActivity {
    pub fn new() -> Self {
        Self {
            metadata: ActivityMetadata {
                outputs: vec![Attribute::new("out", "string", "")],
            },
        }
    }
}

impl Activity for EchoActivity {
    fn metadata(&self) -> &ActivityMetadata {
        &self.metadata
    }
}

pub struct FixtureActivityRegistry {
    pub activities: HashMap<String, Arc<dyn Activity>>,
}

impl ActivityRegistry for FixtureActivityRegistry {
    fn get(&self, type_name: &str) -> Option<Arc<dyn Activity>> {
        self.activities.get(type_name).cloned()
    }
}

// ---- mappers -------------------------------------------------

/// Copies one attribute by name across a mapper's source/target scope.
pub struct CopyMapper {
    pub from: String,
    pub to: String,
}

impl Mapper for CopyMapper {
    fn apply(&self, source: &dyn AttrScope, target: &mut dyn AttrScope) {
        if let Some(value) = source.get_attr_value(&self.from) {
            let _ = target.set_attr_value(&self.to, value.to_string());
        }
    }
}

/// Writes a fixed value into one attribute, ignoring the source scope
/// entirely (used as a patch-supplied input mapper override).
pub struct ConstMapper {
    pub to: String,
    pub value: String,
}

impl Mapper for ConstMapper {
    fn apply(&self, _source: &dyn AttrScope, target: &mut dyn AttrScope) {
        let _ = target.set_attr_value(&self.to, self.value.clone());
    }
}

// ---- flow behavior -------------------------------------------------

/// Always accepts `Start`/`Resume`; `TasksDone`/`Done` are no-ops. The
/// scenarios only exercise the task-side of the core, so the flow-level
/// contract stays minimal.
pub struct PassthroughFlowBehavior;

impl FlowBehavior for PassthroughFlowBehavior {
    fn start(&self, _instance: &mut Instance, _payload: &Value) -> (bool, i64) {
        (true, 0)
    }
    fn resume(&self, _instance: &mut Instance, _payload: &Value) -> bool {
        true
    }
    fn tasks_done(&self, _instance: &mut Instance, _done_code: i64) {}
    fn done(&self, _instance: &mut Instance) {}
}

// ---- task behaviors -------------------------------------------------

/// Root behavior for scenario 1: enters every child at `Eval` (there is
/// exactly one), then waits to be notified.
pub struct SingleChildRootBehavior;

impl TaskBehavior for SingleChildRootBehavior {
    fn enter(&self, _cx: &mut TaskCx<'_>, enter_code: i64) -> (bool, i64) {
        (true, enter_code)
    }
    fn eval(&self, cx: &mut TaskCx<'_>, _eval_code: i64) -> (bool, i64) {
        cx.enter_all_children(0).expect("root has a defined child");
        (false, 0)
    }
    fn post_eval(&self, _cx: &mut TaskCx<'_>, _eval_code: i64, _resume_data: Option<Value>) -> (bool, i64) {
        (false, 0)
    }
    fn done(&self, _cx: &mut TaskCx<'_>, done_code: i64) -> TaskDoneOutcome {
        TaskDoneOutcome {
            notify_parent: true,
            child_done_code: done_code,
            task_entries: Vec::new(),
        }
    }
    fn child_done(&self, _cx: &mut TaskCx<'_>, _child_task_id: &str, child_done_code: i64) -> (bool, i64) {
        (true, child_done_code)
    }
}

/// The echo leaf task: copies its mapped-in `msg` input to its `out`
/// output, then reports done.
pub struct EchoTaskBehavior;

impl TaskBehavior for EchoTaskBehavior {
    fn enter(&self, _cx: &mut TaskCx<'_>, enter_code: i64) -> (bool, i64) {
        (true, enter_code)
    }
    fn eval(&self, cx: &mut TaskCx<'_>, _eval_code: i64) -> (bool, i64) {
        if let Some(msg) = cx.data().expect("live task data").get_attr_value("msg").map(|s| s.to_string()) {
            let _ = cx.data_mut().expect("live task data").set_attr_value("out", msg);
        }
        (true, 0)
    }
    fn post_eval(&self, _cx: &mut TaskCx<'_>, _eval_code: i64, _resume_data: Option<Value>) -> (bool, i64) {
        (false, 0)
    }
    fn done(&self, _cx: &mut TaskCx<'_>, _done_code: i64) -> TaskDoneOutcome {
        TaskDoneOutcome {
            notify_parent: true,
            child_done_code: 0,
            task_entries: Vec::new(),
        }
    }
    fn child_done(&self, _cx: &mut TaskCx<'_>, _child_task_id: &str, _child_done_code: i64) -> (bool, i64) {
        (false, 0)
    }
}

/// Scenario 2's root: enters only `A`; `B` is chained in by `A`'s own
/// `Done` once the link between them is evaluated.
pub struct SeqRootBehavior;

impl TaskBehavior for SeqRootBehavior {
    fn enter(&self, _cx: &mut TaskCx<'_>, enter_code: i64) -> (bool, i64) {
        (true, enter_code)
    }
    fn eval(&self, cx: &mut TaskCx<'_>, _eval_code: i64) -> (bool, i64) {
        cx.enter_children(&[TaskEntry::task("A", 0)]).expect("task A is defined");
        (false, 0)
    }
    fn post_eval(&self, _cx: &mut TaskCx<'_>, _eval_code: i64, _resume_data: Option<Value>) -> (bool, i64) {
        (false, 0)
    }
    fn done(&self, _cx: &mut TaskCx<'_>, done_code: i64) -> TaskDoneOutcome {
        TaskDoneOutcome {
            notify_parent: true,
            child_done_code: done_code,
            task_entries: Vec::new(),
        }
    }
    fn child_done(&self, _cx: &mut TaskCx<'_>, _child_task_id: &str, child_done_code: i64) -> (bool, i64) {
        (true, child_done_code)
    }
}

/// Task `A`: on completion, marks the `A -> B` link traversable and chains
/// straight into entering `B`, without notifying the root yet.
pub struct SeqABehavior;

impl TaskBehavior for SeqABehavior {
    fn enter(&self, _cx: &mut TaskCx<'_>, enter_code: i64) -> (bool, i64) {
        (true, enter_code)
    }
    fn eval(&self, _cx: &mut TaskCx<'_>, _eval_code: i64) -> (bool, i64) {
        (true, 0)
    }
    fn post_eval(&self, _cx: &mut TaskCx<'_>, _eval_code: i64, _resume_data: Option<Value>) -> (bool, i64) {
        (false, 0)
    }
    fn done(&self, cx: &mut TaskCx<'_>, _done_code: i64) -> TaskDoneOutcome {
        cx.eval_link("L");
        TaskDoneOutcome {
            notify_parent: false,
            child_done_code: 0,
            task_entries: vec![TaskEntry::task("B", 0)],
        }
    }
    fn child_done(&self, _cx: &mut TaskCx<'_>, _child_task_id: &str, _child_done_code: i64) -> (bool, i64) {
        (false, 0)
    }
}

/// Task `B`: reads its inbound link before reporting done, then notifies
/// the root for real.
pub struct SeqBBehavior;

impl TaskBehavior for SeqBBehavior {
    fn enter(&self, _cx: &mut TaskCx<'_>, enter_code: i64) -> (bool, i64) {
        (true, enter_code)
    }
    fn eval(&self, cx: &mut TaskCx<'_>, _eval_code: i64) -> (bool, i64) {
        let inbound = cx.from_links();
        assert_eq!(inbound.len(), 1, "B has exactly one inbound link");
        assert!(inbound[0].is_true(), "A must have evaluated the link before B runs");
        (true, 0)
    }
    fn post_eval(&self, _cx: &mut TaskCx<'_>, _eval_code: i64, _resume_data: Option<Value>) -> (bool, i64) {
        (false, 0)
    }
    fn done(&self, _cx: &mut TaskCx<'_>, _done_code: i64) -> TaskDoneOutcome {
        TaskDoneOutcome {
            notify_parent: true,
            child_done_code: 0,
            task_entries: Vec::new(),
        }
    }
    fn child_done(&self, _cx: &mut TaskCx<'_>, _child_task_id: &str, _child_done_code: i64) -> (bool, i64) {
        (false, 0)
    }
}

// ---- flow builders -------------------------------------------------

fn echo_task(parent: &str, input_mapper: Option<Box<dyn Mapper>>, output_mapper: Option<Box<dyn Mapper>>) -> FixtureTask {
    FixtureTask {
        id: "2".into(),
        name: "echo".into(),
        type_id: "echo".into(),
        parent_id: Some(parent.into()),
        child_ids: Vec::new(),
        from_link_ids: Vec::new(),
        attrs: vec![Attribute::new("msg", "string", ""), Attribute::new("out", "string", "")],
        activity_type: "echo".into(),
        input_mapper,
        output_mapper,
    }
}

/// Scenario 1's flow: root (id "1") with a single echo child (id "2").
pub fn single_task_flow(input_mapper: Option<Box<dyn Mapper>>, output_mapper: Option<Box<dyn Mapper>>) -> Arc<dyn FlowDefinition> {
    let root = FixtureTask {
        id: "1".into(),
        name: "root".into(),
        type_id: "root".into(),
        parent_id: None,
        child_ids: vec!["2".into()],
        from_link_ids: Vec::new(),
        attrs: Vec::new(),
        activity_type: "none".into(),
        input_mapper: None,
        output_mapper: None,
    };
    let mut tasks = HashMap::new();
    tasks.insert("1".to_string(), root);
    tasks.insert("2".to_string(), echo_task("1", input_mapper, output_mapper));

    Arc::new(FixtureFlow {
        model_id: "fixture".into(),
        type_id: "single-task".into(),
        name: "single-task-flow".into(),
        root_task_id: "1".into(),
        attrs: Vec::new(),
        tasks,
        links: HashMap::new(),
    })
}

pub fn single_task_model() -> Arc<dyn ModelRegistry> {
    let mut flow_behaviors: HashMap<String, Arc<dyn FlowBehavior>> = HashMap::new();
    flow_behaviors.insert("single-task".into(), Arc::new(PassthroughFlowBehavior));
    let mut task_behaviors: HashMap<String, Arc<dyn TaskBehavior>> = HashMap::new();
    task_behaviors.insert("root".into(), Arc::new(SingleChildRootBehavior));
    task_behaviors.insert("echo".into(), Arc::new(EchoTaskBehavior));

    let model = Arc::new(FixtureModel { flow_behaviors, task_behaviors });
    Arc::new(FixtureModelRegistry { model_id: "fixture".into(), model })
}

pub fn echo_activity_registry() -> Arc<dyn ActivityRegistry> {
    let mut activities: HashMap<String, Arc<dyn Activity>> = HashMap::new();
    activities.insert("echo".into(), Arc::new(EchoActivity::new()));
    Arc::new(FixtureActivityRegistry { activities })
}

/// Scenario 2's flow: root (id "0") with children `A` -> `B` joined by
/// link `L`.
pub fn seq_pair_flow() -> Arc<dyn FlowDefinition> {
    let root = FixtureTask {
        id: "0".into(),
        name: "root".into(),
        type_id: "seq-root".into(),
        parent_id: None,
        child_ids: vec!["A".into(), "B".into()],
        from_link_ids: Vec::new(),
        attrs: Vec::new(),
        activity_type: "none".into(),
        input_mapper: None,
        output_mapper: None,
    };
    let a = FixtureTask {
        id: "A".into(),
        name: "a".into(),
        type_id: "seq-a".into(),
        parent_id: Some("0".into()),
        child_ids: Vec::new(),
        from_link_ids: Vec::new(),
        attrs: Vec::new(),
        activity_type: "none".into(),
        input_mapper: None,
        output_mapper: None,
    };
    let b = FixtureTask {
        id: "B".into(),
        name: "b".into(),
        type_id: "seq-b".into(),
        parent_id: Some("0".into()),
        child_ids: Vec::new(),
        from_link_ids: vec!["L".into()],
        attrs: Vec::new(),
        activity_type: "none".into(),
        input_mapper: None,
        output_mapper: None,
    };
    let link = FixtureLink {
        id: "L".into(),
        from_task_id: "A".into(),
        to_task_id: "B".into(),
    };

    let mut tasks = HashMap::new();
    tasks.insert("0".to_string(), root);
    tasks.insert("A".to_string(), a);
    tasks.insert("B".to_string(), b);
    let mut links = HashMap::new();
    links.insert("L".to_string(), link);

    Arc::new(FixtureFlow {
        model_id: "fixture".into(),
        type_id: "seq-pair".into(),
        name: "seq-pair-flow".into(),
        root_task_id: "0".into(),
        attrs: Vec::new(),
        tasks,
        links,
    })
}

pub fn seq_pair_model() -> Arc<dyn ModelRegistry> {
    let mut flow_behaviors: HashMap<String, Arc<dyn FlowBehavior>> = HashMap::new();
    flow_behaviors.insert("seq-pair".into(), Arc::new(PassthroughFlowBehavior));
    let mut task_behaviors: HashMap<String, Arc<dyn TaskBehavior>> = HashMap::new();
    task_behaviors.insert("seq-root".into(), Arc::new(SeqRootBehavior));
    task_behaviors.insert("seq-a".into(), Arc::new(SeqABehavior));
    task_behaviors.insert("seq-b".into(), Arc::new(SeqBBehavior));

    let model = Arc::new(FixtureModel { flow_behaviors, task_behaviors });
    Arc::new(FixtureModelRegistry { model_id: "fixture".into(), model })
}
