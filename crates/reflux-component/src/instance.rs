//! Component instances
//!
//! An [`Instance`] owns the watchers built from its options: one lazy
//! watcher per computed property, one user watcher per watch, and the render
//! watcher created at mount. They are created in that order, so in any flush
//! computed values settle first, watch callbacks run next and the render
//! runs last.

use crate::error::{Error, Result};
use crate::options::{ComponentOptions, RenderFn, WatchEntry};
use crate::renderer::Renderer;
use crate::vnode::VNode;
use indexmap::IndexMap;
use reflux_core::scheduler::is_flushing;
use reflux_core::{
    handle_error, next_tick_in, observe, parse_path, queue_activated_component, resolve_path,
    untracked, warn, Computed, Getter, Hook, Lifecycle, Map, Value, Watch, WatchHandle,
    WatchOptions, Watcher, WatcherId,
};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

struct InstanceInner {
    uid: u64,
    name: String,
    options: ComponentOptions,
    data: RefCell<Map>,
    computed: RefCell<IndexMap<String, Computed>>,
    /// Every watcher owned by this instance, torn down on destroy
    watchers: RefCell<Vec<Watcher>>,
    render_watcher: RefCell<Option<Watcher>>,
    vnode: RefCell<Option<VNode>>,
    renderer: Rc<dyn Renderer>,
    parent: Option<Weak<InstanceInner>>,
    children: RefCell<Vec<Instance>>,
    mounted: Cell<bool>,
    being_destroyed: Cell<bool>,
    destroyed: Cell<bool>,
    inactive: Cell<bool>,
    self_ref: Weak<InstanceInner>,
}

/// A live component
///
/// Cloning shares the instance.
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

impl Instance {
    /// Create a root instance
    ///
    /// Runs `beforeCreate`, sets up data, computed properties and watches,
    /// then runs `created`. Rendering starts with [`mount`](Self::mount).
    pub fn new(options: ComponentOptions, renderer: Rc<dyn Renderer>) -> Result<Self> {
        Self::create(options, renderer, None)
    }

    /// Create a child instance sharing this instance's renderer
    pub fn new_child(&self, options: ComponentOptions) -> Result<Self> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.0.name.clone()));
        }
        Self::create(options, self.0.renderer.clone(), Some(self))
    }

    fn create(
        options: ComponentOptions,
        renderer: Rc<dyn Renderer>,
        parent: Option<&Instance>,
    ) -> Result<Self> {
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());
        let inner = Rc::new_cyclic(|weak| InstanceInner {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            name,
            options,
            data: RefCell::new(Map::new()),
            computed: RefCell::new(IndexMap::new()),
            watchers: RefCell::new(Vec::new()),
            render_watcher: RefCell::new(None),
            vnode: RefCell::new(None),
            renderer,
            parent: parent.map(|p| Rc::downgrade(&p.0)),
            children: RefCell::new(Vec::new()),
            mounted: Cell::new(false),
            being_destroyed: Cell::new(false),
            destroyed: Cell::new(false),
            inactive: Cell::new(false),
            self_ref: weak.clone(),
        });
        let instance = Instance(inner);
        if let Some(parent) = parent {
            parent.0.children.borrow_mut().push(instance.clone());
        }
        tracing::debug!(uid = instance.0.uid, component = %instance.0.name, "creating instance");

        instance.0.call_hook(Hook::BeforeCreate);
        instance.init_data();
        instance.init_computed();
        for entry in instance.0.options.watch.clone() {
            instance.watch_entry(entry)?;
        }
        instance.0.call_hook(Hook::Created);
        Ok(instance)
    }

    fn init_data(&self) {
        let data = match self.0.options.data.clone() {
            Some(data_fn) => untracked(|| data_fn()),
            None => Map::new(),
        };
        observe(&Value::Map(data.clone()), true);
        *self.0.data.borrow_mut() = data;
    }

    fn init_computed(&self) {
        let data = self.data();
        for (name, getter) in self.0.options.computed.clone() {
            if data.peek(&name).is_some() {
                warn(
                    &format!("The computed property \"{}\" is already defined in data.", name),
                    Some(&*self.0),
                );
                continue;
            }
            let weak = self.0.self_ref.clone();
            let owner: Weak<dyn Lifecycle> = self.0.self_ref.clone();
            let builder = Watcher::builder(move || match weak.upgrade() {
                Some(inner) => getter(&Instance(inner)),
                None => Ok(Value::Null),
            })
            .expression(name.clone())
            .owner(owner);
            let computed = Computed::from_builder(builder);
            self.0.watchers.borrow_mut().push(computed.watcher().clone());
            self.0.computed.borrow_mut().insert(name, computed);
        }
    }

    /// Watch a dot-delimited path of this instance
    ///
    /// The first segment names a data field or computed property.
    pub fn watch(
        &self,
        path: &str,
        options: WatchOptions,
        handler: impl Fn(&Instance, &Value, &Value) -> reflux_core::Result<()> + 'static,
    ) -> Result<WatchHandle> {
        self.watch_entry(WatchEntry {
            path: path.to_string(),
            handler: Rc::new(handler),
            options,
        })
    }

    fn watch_entry(&self, entry: WatchEntry) -> Result<WatchHandle> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.0.name.clone()));
        }
        let getter = self.path_getter(&entry.path);
        let weak = self.0.self_ref.clone();
        let owner: Weak<dyn Lifecycle> = self.0.self_ref.clone();
        let handler = entry.handler;
        let handle = Watch::new(move || getter())
            .expression(entry.path)
            .options(entry.options)
            .owner(owner)
            .start(move |new, old| match weak.upgrade() {
                Some(inner) => handler(&Instance(inner), new, old),
                None => Ok(()),
            })?;
        self.0.watchers.borrow_mut().push(handle.watcher().clone());
        Ok(handle)
    }

    fn path_getter(&self, path: &str) -> Getter {
        let Some(segments) = parse_path(path) else {
            warn(
                &format!(
                    "Failed watching path: \"{}\". Watchers only accept simple dot-delimited paths. For full control, use a function instead.",
                    path
                ),
                Some(&*self.0),
            );
            return Rc::new(|| -> reflux_core::Result<Value> { Ok(Value::Null) });
        };
        let weak = self.0.self_ref.clone();
        Rc::new(move || -> reflux_core::Result<Value> {
            let (Some(inner), Some((first, rest))) = (weak.upgrade(), segments.split_first())
            else {
                return Ok(Value::Null);
            };
            let root = Instance(inner).lookup(first)?.unwrap_or_default();
            Ok(resolve_path(&root, rest))
        })
    }

    fn lookup(&self, key: &str) -> reflux_core::Result<Option<Value>> {
        let computed = self.0.computed.borrow().get(key).cloned();
        if let Some(computed) = computed {
            return computed.get().map(Some);
        }
        Ok(self.data().get(key))
    }

    /// Read a data field or computed property, tracking the read
    pub fn get(&self, key: &str) -> reflux_core::Result<Value> {
        self.lookup(key)?
            .ok_or_else(|| reflux_core::Error::KeyNotFound(key.to_string()))
    }

    /// Write a data field
    ///
    /// Keys must be declared in the data option. Computed properties are
    /// read-only; assigning one only warns.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> reflux_core::Result<()> {
        if self.0.computed.borrow().contains_key(key) {
            warn(
                &format!("Computed property \"{}\" was assigned to but it has no setter.", key),
                Some(&*self.0),
            );
            return Ok(());
        }
        let data = self.data();
        if data.peek(key).is_none() {
            return Err(reflux_core::Error::KeyNotFound(key.to_string()));
        }
        data.set(key, value);
        Ok(())
    }

    /// Start rendering
    ///
    /// Runs `beforeMount`, creates the render watcher (which renders and
    /// patches once), then runs `mounted`.
    pub fn mount(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.0.name.clone()));
        }
        if self.is_mounted() || self.0.render_watcher.borrow().is_some() {
            return Err(Error::AlreadyMounted(self.0.name.clone()));
        }
        let Some(render) = self.0.options.render.clone() else {
            return Err(Error::MissingRender(self.0.name.clone()));
        };
        self.0.call_hook(Hook::BeforeMount);

        let weak = self.0.self_ref.clone();
        let before = self.0.self_ref.clone();
        let owner: Weak<dyn Lifecycle> = self.0.self_ref.clone();
        let watcher = Watcher::builder(move || {
            if let Some(inner) = weak.upgrade() {
                Instance(inner).update_component(&render)?;
            }
            Ok(Value::Null)
        })
        .expression(format!("render of {}", self.0.name))
        .render(true)
        .owner(owner)
        .before(move || {
            if let Some(inner) = before.upgrade() {
                if inner.mounted.get() && !inner.destroyed.get() {
                    inner.call_hook(Hook::BeforeUpdate);
                }
            }
        })
        .build()?;
        *self.0.render_watcher.borrow_mut() = Some(watcher.clone());
        self.0.watchers.borrow_mut().push(watcher);

        self.0.mounted.set(true);
        self.0.call_hook(Hook::Mounted);
        Ok(())
    }

    fn update_component(&self, render: &RenderFn) -> reflux_core::Result<()> {
        let vnode = match render(self) {
            Ok(vnode) => vnode,
            Err(err) => {
                // Keep showing the previous tree
                return handle_error(err, Some(&*self.0), "render");
            }
        };
        let old = self.0.vnode.replace(Some(vnode.clone()));
        untracked(|| self.0.renderer.patch(old.as_ref(), Some(&vnode)))
    }

    /// Queue a re-render even though no dependency changed
    pub fn force_update(&self) {
        let watcher = self.0.render_watcher.borrow().clone();
        if let Some(watcher) = watcher {
            watcher.update();
        }
    }

    /// Tear the instance down
    ///
    /// Runs `beforeDestroy`, detaches from the parent, tears down every
    /// watcher, releases the root data, removes the rendered tree, destroys
    /// children, then runs `destroyed`. Calling it again does nothing.
    pub fn destroy(&self) {
        let inner = &self.0;
        if inner.being_destroyed.get() {
            return;
        }
        inner.call_hook(Hook::BeforeDestroy);
        inner.being_destroyed.set(true);

        if let Some(parent) = self.parent() {
            if !parent.0.being_destroyed.get() {
                parent
                    .0
                    .children
                    .borrow_mut()
                    .retain(|child| !Rc::ptr_eq(&child.0, inner));
            }
        }
        for watcher in inner.watchers.take() {
            watcher.teardown();
        }
        inner.render_watcher.borrow_mut().take();
        if let Some(ob) = inner.data.borrow().observer() {
            ob.release_root();
        }
        inner.destroyed.set(true);

        let old = inner.vnode.take();
        if old.is_some() {
            if let Err(err) = inner.renderer.patch(old.as_ref(), None) {
                if let Err(err) = handle_error(err, Some(&**inner), "destroy") {
                    tracing::error!(component = %inner.name, error = %err, "patch on destroy failed");
                }
            }
        }
        for child in inner.children.take() {
            child.destroy();
        }
        inner.call_hook(Hook::Destroyed);
        tracing::debug!(uid = inner.uid, component = %inner.name, "instance destroyed");
    }

    /// Put a kept-alive instance and its children to sleep
    pub fn deactivate(&self) {
        self.0.deactivate_tree();
    }

    /// Wake a kept-alive instance
    ///
    /// During a flush the `activated` hooks are deferred until the flush
    /// completes.
    pub fn activate(&self) {
        if !self.is_inactive() {
            return;
        }
        if is_flushing() {
            queue_activated_component(self.0.clone());
        } else {
            self.0.activate_tree();
        }
    }

    /// Run `callback` after the next tick, with errors attributed to this
    /// instance
    pub fn next_tick(
        &self,
        callback: impl FnOnce(&Instance) -> reflux_core::Result<()> + 'static,
    ) {
        let weak = self.0.self_ref.clone();
        let owner: Weak<dyn Lifecycle> = self.0.self_ref.clone();
        next_tick_in(owner, move || match weak.upgrade() {
            Some(inner) => callback(&Instance(inner)),
            None => Ok(()),
        });
    }

    pub fn uid(&self) -> u64 {
        self.0.uid
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Root data map
    pub fn data(&self) -> Map {
        self.0.data.borrow().clone()
    }

    pub fn parent(&self) -> Option<Instance> {
        self.0.parent.as_ref().and_then(Weak::upgrade).map(Instance)
    }

    pub fn children(&self) -> Vec<Instance> {
        self.0.children.borrow().clone()
    }

    /// Most recently rendered tree
    pub fn vnode(&self) -> Option<VNode> {
        self.0.vnode.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn is_inactive(&self) -> bool {
        self.0.inactive.get()
    }

    pub fn render_watcher(&self) -> Option<Watcher> {
        self.0.render_watcher.borrow().clone()
    }

    pub fn computed_watcher(&self, name: &str) -> Option<Watcher> {
        self.0
            .computed
            .borrow()
            .get(name)
            .map(|c| c.watcher().clone())
    }

    /// Watchers owned by this instance, in creation order
    pub fn watchers(&self) -> Vec<Watcher> {
        self.0.watchers.borrow().clone()
    }

    /// This instance as a lifecycle owner
    pub fn as_lifecycle(&self) -> Rc<dyn Lifecycle> {
        self.0.clone()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("uid", &self.0.uid)
            .field("name", &self.0.name)
            .field("mounted", &self.0.mounted.get())
            .field("destroyed", &self.0.destroyed.get())
            .finish()
    }
}

impl InstanceInner {
    fn deactivate_tree(&self) {
        if self.inactive.get() {
            return;
        }
        self.inactive.set(true);
        for child in self.children.borrow().clone() {
            child.0.deactivate_tree();
        }
        self.call_hook(Hook::Deactivated);
    }

    fn activate_tree(&self) {
        if !self.inactive.get() {
            return;
        }
        self.inactive.set(false);
        for child in self.children.borrow().clone() {
            child.0.activate_tree();
        }
        self.call_hook(Hook::Activated);
    }
}

impl Lifecycle for InstanceInner {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn call_hook(&self, hook: Hook) {
        let handlers = self.options.hook_handlers(hook);
        if handlers.is_empty() {
            return;
        }
        let Some(inner) = self.self_ref.upgrade() else {
            return;
        };
        let instance = Instance(inner);
        let info = format!("{} hook", hook);
        untracked(|| {
            for handler in handlers {
                let Err(err) = handler(&instance) else {
                    continue;
                };
                if let Err(err) = handle_error(err, Some(self), &info) {
                    tracing::error!(component = %self.name, %hook, error = %err, "hook failed");
                }
            }
        });
    }

    fn activate(&self) {
        self.activate_tree();
    }

    fn parent(&self) -> Option<Rc<dyn Lifecycle>> {
        self.parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|p| p as Rc<dyn Lifecycle>)
    }

    fn remove_watcher(&self, id: WatcherId) {
        // Destroy tears down a list it already took
        if !self.being_destroyed.get() {
            self.watchers.borrow_mut().retain(|w| w.id() != id);
        }
    }

    fn capture_error(&self, err: &reflux_core::Error, origin: &dyn Lifecycle, info: &str) -> bool {
        let handlers = self.options.error_captured.clone();
        untracked(|| handlers.iter().any(|handler| handler(err, origin, info)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingRenderer;
    use reflux_core::{run_pending, set_error_handler, set_warn_handler};

    type Log = Rc<RefCell<Vec<String>>>;

    fn new_log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn record(log: &Log, entry: &str) -> impl Fn(&Instance) -> reflux_core::Result<()> {
        let log = log.clone();
        let entry = entry.to_string();
        move |_| {
            log.borrow_mut().push(entry.clone());
            Ok(())
        }
    }

    fn greeter(log: &Log) -> ComponentOptions {
        let mut options = ComponentOptions::new()
            .name("greeter")
            .data(|| Map::new().with("name", "ada"))
            .render(|vm| {
                let name = vm.get("name")?;
                Ok(VNode::element("p").child(VNode::text(name.as_str().unwrap_or_default())))
            });
        for hook in [
            Hook::BeforeCreate,
            Hook::Created,
            Hook::BeforeMount,
            Hook::Mounted,
            Hook::BeforeUpdate,
            Hook::Updated,
            Hook::BeforeDestroy,
            Hook::Destroyed,
        ] {
            options = options.hook(hook, record(log, hook.name()));
        }
        options
    }

    #[test]
    fn test_mount_and_update() {
        reflux_core::reset();
        let log = new_log();
        let renderer = RecordingRenderer::new();
        let vm = Instance::new(greeter(&log), Rc::new(renderer.clone())).expect("instance");
        vm.mount().expect("mount");
        assert_eq!(renderer.patch_count(), 1);
        assert_eq!(
            renderer.current().map(|n| n.text_content()),
            Some("ada".to_string())
        );

        vm.set("name", "grace").expect("set");
        assert_eq!(renderer.patch_count(), 1, "render waits for the tick");
        run_pending().expect("tick");

        assert_eq!(renderer.patch_count(), 2);
        assert_eq!(vm.vnode().map(|n| n.text_content()), Some("grace".to_string()));
        assert_eq!(
            log.borrow().as_slice(),
            ["beforeCreate", "created", "beforeMount", "mounted", "beforeUpdate", "updated"]
        );
    }

    #[test]
    fn test_watchers_run_computed_then_watch_then_render() {
        reflux_core::reset();
        let log = new_log();
        let watch_log = log.clone();
        let render_log = log.clone();
        let options = ComponentOptions::new()
            .data(|| Map::new().with("count", 1))
            .computed("double", |vm| Ok(Value::Int(vm.get("count")?.try_int()? * 2)))
            .watch("count", move |_, new, old| {
                watch_log.borrow_mut().push(format!("watch {} -> {}", old, new));
                Ok(())
            })
            .render(move |vm| {
                let double = vm.get("double")?;
                render_log.borrow_mut().push(format!("render {}", double));
                Ok(VNode::text(double.to_string()))
            });
        let vm = Instance::new(options, Rc::new(RecordingRenderer::new())).expect("instance");
        vm.mount().expect("mount");

        let ids: Vec<_> = vm.watchers().iter().map(|w| w.id()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "computed < watch < render");
        assert_eq!(
            vm.computed_watcher("double").map(|w| w.id()),
            Some(ids[0])
        );
        assert_eq!(vm.render_watcher().map(|w| w.id()), Some(ids[2]));

        log.borrow_mut().clear();
        vm.set("count", 5).expect("set");
        run_pending().expect("tick");
        assert_eq!(log.borrow().as_slice(), ["watch 1 -> 5", "render 10"]);
        assert_eq!(vm.vnode(), Some(VNode::text("10")));
    }

    #[test]
    fn test_render_error_captured_by_parent() {
        reflux_core::reset();
        let captured = new_log();
        let sink = captured.clone();
        let renderer = RecordingRenderer::new();
        let parent = Instance::new(
            ComponentOptions::new()
                .name("parent")
                .error_captured(move |err, origin, info| {
                    sink.borrow_mut()
                        .push(format!("{} in {} from {}", err, info, origin.name()));
                    true
                }),
            Rc::new(renderer.clone()),
        )
        .expect("parent");

        let child = parent
            .new_child(
                ComponentOptions::new()
                    .name("child")
                    .data(|| Map::new().with("fail", false))
                    .render(|vm| {
                        if vm.get("fail")?.is_truthy() {
                            return Err(reflux_core::Error::evaluation("render failed"));
                        }
                        Ok(VNode::text("ok"))
                    }),
            )
            .expect("child");
        child.mount().expect("mount");
        assert_eq!(parent.children().len(), 1);

        child.set("fail", true).expect("set");
        run_pending().expect("captured errors do not escape");
        assert_eq!(
            captured.borrow().as_slice(),
            ["Evaluation error: render failed in render from child"]
        );
        assert_eq!(child.vnode(), Some(VNode::text("ok")), "previous tree is kept");
        assert_eq!(renderer.patch_count(), 1);
    }

    #[test]
    fn test_hook_error_is_routed_with_hook_info() {
        reflux_core::reset();
        let infos = new_log();
        let sink = infos.clone();
        set_error_handler(Some(Rc::new(
            move |_: &reflux_core::Error, owner: Option<&dyn Lifecycle>, info: &str| {
                let name = owner.map(|o| o.name().to_string()).unwrap_or_default();
                sink.borrow_mut().push(format!("{} ({})", info, name));
            },
        )));
        let options = ComponentOptions::new()
            .name("faulty")
            .render(|_| Ok(VNode::Empty))
            .hook(Hook::Mounted, |_| Err(reflux_core::Error::evaluation("oops")));
        let vm = Instance::new(options, Rc::new(RecordingRenderer::new())).expect("instance");
        vm.mount().expect("hook errors do not fail mount");
        assert!(vm.is_mounted());
        assert_eq!(infos.borrow().as_slice(), ["mounted hook (faulty)"]);
        reflux_core::reset();
    }

    #[test]
    fn test_destroy_tears_everything_down() {
        reflux_core::reset();
        let log = new_log();
        let renderer = RecordingRenderer::new();
        let vm = Instance::new(greeter(&log), Rc::new(renderer.clone())).expect("instance");
        vm.mount().expect("mount");
        let child_log = new_log();
        let child = vm
            .new_child(ComponentOptions::new().hook(Hook::Destroyed, record(&child_log, "child destroyed")))
            .expect("child");
        log.borrow_mut().clear();

        vm.destroy();
        vm.destroy();
        assert!(vm.is_destroyed());
        assert!(child.is_destroyed());
        assert_eq!(log.borrow().as_slice(), ["beforeDestroy", "destroyed"]);
        assert_eq!(child_log.borrow().as_slice(), ["child destroyed"]);
        assert!(vm.watchers().is_empty());
        assert_eq!(renderer.patches().last().map(|p| p.new.clone()), Some(None));
        assert_eq!(vm.data().observer().map(|ob| ob.root_count()), Some(0));

        vm.data().set("name", "nobody");
        assert!(!reflux_core::next_tick::has_pending(), "no watcher is left to queue");
        assert!(matches!(vm.mount(), Err(Error::Destroyed(_))));
    }

    #[test]
    fn test_keep_alive_activation() {
        reflux_core::reset();
        let log = new_log();
        let renderer: Rc<dyn Renderer> = Rc::new(RecordingRenderer::new());
        let parent = Instance::new(ComponentOptions::new(), renderer).expect("parent");
        let child = parent
            .new_child(
                ComponentOptions::new()
                    .hook(Hook::Activated, record(&log, "activated"))
                    .hook(Hook::Deactivated, record(&log, "deactivated")),
            )
            .expect("child");

        child.activate();
        assert!(log.borrow().is_empty(), "active instances are not re-activated");

        parent.deactivate();
        assert!(child.is_inactive());
        child.activate();
        assert_eq!(log.borrow().as_slice(), ["deactivated", "activated"]);

        // Activation requested during a flush waits for the flush to finish
        child.deactivate();
        let data = Map::new().with("show", false);
        observe(&Value::Map(data.clone()), false);
        let reader = data.clone();
        let target = child.clone();
        let inside = log.clone();
        let seen_during_flush = Rc::new(Cell::new(0usize));
        let seen = seen_during_flush.clone();
        let _handle = reflux_core::watch(
            move || Ok(reader.get("show").unwrap_or_default()),
            move |_, _| {
                target.activate();
                seen.set(inside.borrow().len());
                Ok(())
            },
            WatchOptions::default(),
        )
        .expect("watch");
        data.set("show", true);
        run_pending().expect("tick");
        assert_eq!(seen_during_flush.get(), 3, "hook deferred past the callback");
        assert_eq!(
            log.borrow().as_slice(),
            ["deactivated", "activated", "deactivated", "activated"]
        );
    }

    #[test]
    fn test_cancelled_watch_leaves_watcher_list() {
        reflux_core::reset();
        let options = ComponentOptions::new().data(|| Map::new().with("a", 1));
        let vm = Instance::new(options, Rc::new(RecordingRenderer::new())).expect("instance");
        let base = vm.watchers().len();

        for _ in 0..50 {
            vm.watch("a", WatchOptions::default(), |_, _, _| Ok(()))
                .expect("watch")
                .cancel();
        }
        assert_eq!(vm.watchers().len(), base);

        let kept = vm
            .watch("a", WatchOptions::default(), |_, _, _| Ok(()))
            .expect("watch");
        assert_eq!(vm.watchers().len(), base + 1);
        vm.destroy();
        assert!(!kept.watcher().is_active());
    }

    #[test]
    fn test_next_tick_sees_rendered_tree() {
        reflux_core::reset();
        let log = new_log();
        let vm = Instance::new(greeter(&log), Rc::new(RecordingRenderer::new())).expect("instance");
        vm.mount().expect("mount");

        vm.set("name", "linus").expect("set");
        let seen = new_log();
        let sink = seen.clone();
        vm.next_tick(move |vm| {
            sink.borrow_mut()
                .push(vm.vnode().map(|n| n.text_content()).unwrap_or_default());
            Ok(())
        });
        run_pending().expect("tick");
        assert_eq!(seen.borrow().as_slice(), ["linus"]);
    }

    #[test]
    fn test_property_access() {
        reflux_core::reset();
        let warnings = new_log();
        let sink = warnings.clone();
        set_warn_handler(Some(Rc::new(move |msg: &str, _: Option<&dyn Lifecycle>| {
            sink.borrow_mut().push(msg.to_string())
        })));
        let options = ComponentOptions::new()
            .data(|| Map::new().with("a", 1))
            .computed("b", |vm| vm.get("a"))
            .computed("a", |_| Ok(Value::Null));
        let vm = Instance::new(options, Rc::new(RecordingRenderer::new())).expect("instance");

        assert_eq!(vm.get("b").expect("computed"), Value::Int(1));
        assert!(matches!(
            vm.get("missing"),
            Err(reflux_core::Error::KeyNotFound(_))
        ));
        assert!(matches!(
            vm.set("missing", 1),
            Err(reflux_core::Error::KeyNotFound(_))
        ));
        vm.set("b", 2).expect("warns only");
        assert_eq!(vm.get("a").expect("data"), Value::Int(1));
        assert_eq!(warnings.borrow().len(), 2, "duplicate computed and computed assignment");
        assert!(matches!(vm.mount(), Err(Error::MissingRender(_))));
        reflux_core::reset();
    }
}
