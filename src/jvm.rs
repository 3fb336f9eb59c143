use jacknative_engine::{Attachment, Delivery, EntryBinding, Error, Mode, PortCounts, Runtime};
use jni::objects::{GlobalRef, JClass, JMethodID, JObject, JObjectArray, JValue, WeakRef};
use jni::signature::{Primitive, ReturnType};
use jni::sys::jsize;
use jni::{JNIEnv, JavaVM};
use once_cell::sync::OnceCell;
use std::ptr::NonNull;

pub const EXCEPTION_CLASS: &str = "com/noisepages/nettoyeur/jack/JackException";
const BYTE_BUFFER_CLASS: &str = "java/nio/ByteBuffer";
const PROCESS_METHOD: &str = "processBytes";
const PROCESS_SIG: &str = "([Ljava/nio/ByteBuffer;[Ljava/nio/ByteBuffer;Z)V";
const SHUTDOWN_METHOD: &str = "handleShutdown";
const SHUTDOWN_SIG: &str = "()V";

static JVM: OnceCell<JavaVM> = OnceCell::new();
static ENTRY_POINTS: EntryBinding<EntryPoints> = EntryBinding::new();

#[derive(Clone, Copy)]
struct EntryPoints {
    process: JMethodID,
    shutdown: JMethodID,
}

pub fn cache_vm(vm: JavaVM) {
    let _ = JVM.set(vm);
}

fn java_vm(env: &JNIEnv) -> Result<&'static JavaVM, Error> {
    JVM.get_or_try_init(|| env.get_java_vm())
        .map_err(|e| Error::Runtime(format!("no java vm: {e}")))
}

fn runtime_error(e: jni::errors::Error) -> Error {
    Error::Runtime(e.to_string())
}

fn method_id(env: &mut JNIEnv, class: &JClass, name: &str, sig: &str) -> Result<JMethodID, String> {
    match env.get_method_id(class, name, sig) {
        Ok(id) => Ok(id),
        Err(_) => {
            // Drop the pending NoSuchMethodError; the caller throws its own.
            let _ = env.exception_clear();
            Err(format!("{name} method not found"))
        }
    }
}

fn bind_entry_points(env: &mut JNIEnv, owner: &JObject) -> Result<EntryPoints, Error> {
    ENTRY_POINTS
        .get_or_bind(|| {
            let class = env.get_object_class(owner).map_err(|e| e.to_string())?;
            let process = method_id(env, &class, PROCESS_METHOD, PROCESS_SIG)?;
            let shutdown = method_id(env, &class, SHUTDOWN_METHOD, SHUTDOWN_SIG)?;
            let _ = env.delete_local_ref(class);
            Ok(EntryPoints { process, shutdown })
        })
        .copied()
}

fn view_collection(env: &mut JNIEnv, len: usize) -> Result<GlobalRef, Error> {
    let len = jsize::try_from(len).map_err(|e| Error::Runtime(e.to_string()))?;
    let array = env
        .new_object_array(len, BYTE_BUFFER_CLASS, JObject::null())
        .map_err(runtime_error)?;
    let global = env.new_global_ref(&array).map_err(runtime_error);
    let _ = env.delete_local_ref(array);
    global
}

/// Clears an exception thrown by a managed callback so it can't surface in
/// an unrelated call later on this thread.
fn settle<T>(env: &mut JNIEnv, result: jni::errors::Result<T>, method: &str) -> Result<(), Error> {
    match result {
        Ok(_) => Ok(()),
        Err(jni::errors::Error::JavaException) => {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
            Ok(())
        }
        Err(e) => Err(Error::Runtime(format!("{method}: {e}"))),
    }
}

/// Managed side of one client: a weak reference to the Java owner and one
/// `ByteBuffer[]` per direction.
pub struct JvmRuntime {
    vm: &'static JavaVM,
    owner: WeakRef,
    views: [GlobalRef; 2],
    entry: EntryPoints,
    daemon: bool,
}

impl JvmRuntime {
    pub fn new(
        env: &mut JNIEnv,
        owner: &JObject,
        ports: PortCounts,
        daemon: bool,
    ) -> Result<Self, Error> {
        let vm = java_vm(env)?;
        let entry = bind_entry_points(env, owner)?;
        let owner = env
            .new_weak_ref(owner)
            .map_err(runtime_error)?
            .ok_or_else(|| Error::Runtime("owner is null".to_string()))?;
        let views = [
            view_collection(env, ports.inputs())?,
            view_collection(env, ports.outputs())?,
        ];
        Ok(Self {
            vm,
            owner,
            views,
            entry,
            daemon,
        })
    }

    fn collection(&self, mode: Mode) -> &JObject<'static> {
        self.views[mode.slot()].as_obj()
    }
}

impl Runtime for JvmRuntime {
    type View = GlobalRef;
    type Attachment<'a> = JvmAttachment<'a>;

    fn attach(&self) -> Result<JvmAttachment<'_>, Error> {
        let env = if self.daemon {
            self.vm.attach_current_thread_as_daemon()
        } else {
            self.vm.attach_current_thread_permanently()
        }
        .map_err(|e| Error::AttachmentFailed(e.to_string()))?;
        Ok(JvmAttachment { env, runtime: self })
    }

    fn notify_shutdown(&self) -> Result<Delivery, Error> {
        let mut env = self
            .vm
            .attach_current_thread()
            .map_err(|e| Error::AttachmentFailed(e.to_string()))?;
        let Some(owner) = self.owner.upgrade_local(&*env).map_err(runtime_error)? else {
            return Ok(Delivery::OwnerReleased);
        };
        let result = unsafe {
            env.call_method_unchecked(
                &owner,
                self.entry.shutdown,
                ReturnType::Primitive(Primitive::Void),
                &[],
            )
        };
        let _ = env.delete_local_ref(owner);
        settle(&mut env, result, SHUTDOWN_METHOD)?;
        Ok(Delivery::Delivered)
    }
}

pub struct JvmAttachment<'a> {
    env: JNIEnv<'a>,
    runtime: &'a JvmRuntime,
}

impl Attachment for JvmAttachment<'_> {
    type View = GlobalRef;

    unsafe fn create_view(&mut self, buffer: NonNull<f32>, bytes: usize) -> Result<GlobalRef, Error> {
        let local = unsafe { self.env.new_direct_byte_buffer(buffer.as_ptr().cast::<u8>(), bytes) }
            .map_err(runtime_error)?;
        let view = self.env.new_global_ref(&local).map_err(runtime_error);
        let _ = self.env.delete_local_ref(local);
        view
    }

    fn publish(&mut self, mode: Mode, index: usize, view: &GlobalRef) -> Result<(), Error> {
        let index = jsize::try_from(index).map_err(|e| Error::Runtime(e.to_string()))?;
        // The global ref keeps the array alive for as long as the runtime.
        let array = unsafe { JObjectArray::from_raw(self.runtime.collection(mode).as_raw()) };
        self.env
            .set_object_array_element(&array, index, view.as_obj())
            .map_err(runtime_error)
    }

    fn process(&mut self, reallocated: bool) -> Result<(), Error> {
        // A collected owner means the client is being torn down.
        let Some(owner) = self.runtime.owner.upgrade_local(&self.env).map_err(runtime_error)? else {
            return Ok(());
        };
        let args = [
            JValue::from(self.runtime.collection(Mode::Input)).as_jni(),
            JValue::from(self.runtime.collection(Mode::Output)).as_jni(),
            JValue::Bool(reallocated.into()).as_jni(),
        ];
        let result = unsafe {
            self.env.call_method_unchecked(
                &owner,
                self.runtime.entry.process,
                ReturnType::Primitive(Primitive::Void),
                &args,
            )
        };
        let _ = self.env.delete_local_ref(owner);
        settle(&mut self.env, result, PROCESS_METHOD)
    }
}
