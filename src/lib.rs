#![allow(non_snake_case)]
//! Native half of `com.noisepages.nettoyeur.jack.JackNativeClient`.
//!
//! A Java client object opens a JACK client through `openClient` and keeps the
//! returned handle. JACK then calls back into the object's `processBytes`
//! once per block with direct `ByteBuffer`s over the port buffers, and into
//! `handleShutdown` if the server drops the client.

mod jvm;
mod logging;

pub use jvm::{JvmAttachment, JvmRuntime};

use jacknative_engine::{Backend, Error, HandleTable, JackBackend, MAX_PORTS, Mode, PortCounts};
use jni::objects::{JClass, JObject, JString};
use jni::sys::{JNI_VERSION_1_4, jboolean, jint, jlong};
use jni::{JNIEnv, JavaVM};
use once_cell::sync::Lazy;
use std::ffi::c_void;
use tracing::{error, warn};

pub type NativeClient = jacknative_engine::Client<JackBackend, JvmRuntime>;

static CLIENTS: Lazy<HandleTable<NativeClient>> = Lazy::new(HandleTable::new);

#[unsafe(no_mangle)]
pub extern "system" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    logging::init();
    jvm::cache_vm(vm);
    JNI_VERSION_1_4
}

fn throw(env: &mut JNIEnv, err: &Error) {
    error!("{err}");
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
    if env.throw_new(jvm::EXCEPTION_CLASS, err.to_string()).is_err() {
        error!("fatal: cannot access class JackException");
    }
}

/// Runs `f` on the client behind `handle`; unknown or closed handles yield 0.
fn with_client(handle: jlong, f: impl FnOnce(&NativeClient) -> usize) -> jint {
    count(CLIENTS.with(handle, f).unwrap_or(0))
}

fn count(n: usize) -> jint {
    jint::try_from(n).unwrap_or(jint::MAX)
}

fn open_client(
    env: &mut JNIEnv,
    owner: &JObject,
    client_name: &JString,
    ports_in: jint,
    ports_out: jint,
    daemon: bool,
) -> Result<NativeClient, Error> {
    let ports = PortCounts::from_signed(ports_in, ports_out)?;
    let name: String = env
        .get_string(client_name)
        .map_err(|e| Error::Runtime(format!("client name: {e}")))?
        .into();
    let runtime = JvmRuntime::new(env, owner, ports, daemon)?;
    NativeClient::open(&JackBackend::from_env(), &name, ports, runtime)
}

/// `private native long openClient(String, int, int, boolean) throws JackException`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_openClient<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
    client_name: JString<'local>,
    ports_in: jint,
    ports_out: jint,
    is_daemon: jboolean,
) -> jlong {
    match open_client(&mut env, &obj, &client_name, ports_in, ports_out, is_daemon != 0) {
        Ok(client) => CLIENTS.insert(client),
        Err(e) => {
            throw(&mut env, &e);
            0
        }
    }
}

fn connect_ports(
    env: &mut JNIEnv,
    handle: jlong,
    port: jint,
    range: jint,
    target: &JString,
    mode: Mode,
) -> jint {
    let (Ok(start), Ok(range)) = (usize::try_from(port), usize::try_from(range)) else {
        return 0;
    };
    let target: Option<String> = if target.is_null() {
        None
    } else {
        match env.get_string(target) {
            Ok(s) => Some(s.into()),
            Err(e) => {
                warn!("cannot read connection target: {e}");
                return 0;
            }
        }
    };
    with_client(handle, |client| client.connect(mode, start, range, target.as_deref()))
}

fn disconnect_ports(handle: jlong, port: jint, range: jint, mode: Mode) -> jint {
    let (Ok(start), Ok(range)) = (usize::try_from(port), usize::try_from(range)) else {
        return 0;
    };
    with_client(handle, |client| client.disconnect(mode, start, range))
}

/// `private native int connectInputPorts(long, int, int, String)`
///
/// `target == null`: no autoconnect, `""`: physical ports, otherwise ports of
/// the named client.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_connectInputPorts<'local>(
    mut env: JNIEnv<'local>,
    _obj: JObject<'local>,
    handle: jlong,
    port: jint,
    range: jint,
    target: JString<'local>,
) -> jint {
    connect_ports(&mut env, handle, port, range, &target, Mode::Input)
}

/// `private native int connectOutputPorts(long, int, int, String)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_connectOutputPorts<'local>(
    mut env: JNIEnv<'local>,
    _obj: JObject<'local>,
    handle: jlong,
    port: jint,
    range: jint,
    target: JString<'local>,
) -> jint {
    connect_ports(&mut env, handle, port, range, &target, Mode::Output)
}

/// `private native int disconnectInputPorts(long, int, int)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_disconnectInputPorts<'local>(
    _env: JNIEnv<'local>,
    _obj: JObject<'local>,
    handle: jlong,
    port: jint,
    range: jint,
) -> jint {
    disconnect_ports(handle, port, range, Mode::Input)
}

/// `private native int disconnectOutputPorts(long, int, int)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_disconnectOutputPorts<'local>(
    _env: JNIEnv<'local>,
    _obj: JObject<'local>,
    handle: jlong,
    port: jint,
    range: jint,
) -> jint {
    disconnect_ports(handle, port, range, Mode::Output)
}

/// `private native void closeClient(long)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_closeClient<'local>(
    _env: JNIEnv<'local>,
    _obj: JObject<'local>,
    handle: jlong,
) {
    // Dropped outside the table lock: closing waits for the process thread.
    drop(CLIENTS.remove(handle));
}

/// `private static native int getMaxPorts()`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_getMaxPorts<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jint {
    count(MAX_PORTS)
}

/// `public static native int getSampleRate() throws JackException`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_getSampleRate<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jint {
    match JackBackend::from_env().server_info() {
        Ok(info) => count(info.sample_rate),
        Err(e) => {
            throw(&mut env, &e);
            0
        }
    }
}

/// `public static native int getBufferSize() throws JackException`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_noisepages_nettoyeur_jack_JackNativeClient_getBufferSize<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jint {
    match JackBackend::from_env().server_info() {
        Ok(info) => count(info.buffer_size),
        Err(e) => {
            throw(&mut env, &e);
            0
        }
    }
}
