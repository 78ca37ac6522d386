//! Fixed package build order and per-package export metadata.
//!
//! The build order is a hand-maintained total order, not computed from the
//! `depends` declarations below. `depends` is informational only: it is
//! carried into gpkg control metadata for the benefit of an installer, and
//! nothing here checks it against the sequence.

/// Packages in build order. Later packages assume the filesystem state left
/// by everything before them.
pub const PACKAGE_ORDER: &[&str] = &[
    // Core System Foundation
    "kernel_headers",
    "glibc",
    "libxcrypt",
    "zlib",
    "openssl",
    "libffi",
    "ncurses",
    "expat",
    "zstd",
    "pkg-config",
    "bison",
    "flex",
    "python",
    "setuptools",
    "markupsafe",
    "mako",
    "meson",
    "ninja",
    "gperf",
    "gettext",
    "perl",
    "texinfo",
    "util-macros",
    "elfutils",
    "pcre2",
    "e2fsprogs",
    "util-linux",
    "libxml2",
    "dbus",
    "glib",
    "gobject-introspection",
    // X11 Foundation
    "xorgproto",
    "libxau",
    "libxdmcp",
    "xcb-proto",
    "libpthread-stubs",
    "libxcb",
    "xtrans",
    "xcb-util",
    "xcb-util-keysyms",
    // X11 Client Libraries
    "libx11",
    "libxext",
    "libxfixes",
    "libxrender",
    "libxdamage",
    "libxcomposite",
    "libxcursor",
    "libxi",
    "libxrandr",
    "libxinerama",
    "libxtst",
    "libxxf86vm",
    "libXres",
    "libxpm",
    // Graphics Libraries
    "libpng",
    "libjpeg-turbo",
    "tiff",
    "freetype",
    "fontconfig",
    "pixman",
    "libxft",
    "libice",
    "libsm",
    "libxt",
    "libxmu",
    "libxaw",
    "libxkbfile",
    "libfontenc",
    "libxfont2",
    "xkbcomp",
    "libpciaccess",
    "pciutils",
    "libxshmfence",
    "font-util",
    "system-fonts",
    "eudev",
    "libdrm",
    "libglvnd",
    "mesa",
    // GTK Stack & Rendering
    "cairo",
    "harfbuzz",
    "fribidi",
    "pango",
    "shared-mime-info",
    "gdk-pixbuf",
    "atk",
    "at-spi2-core",
    "at-spi2-atk",
    "libepoxy",
    "libxkbcommon",
    "gsettings-desktop-schemas",
    "hicolor-icon-theme",
    "adwaita-icon-theme",
    "gtk3",
    "startup-notification",
    "libwnck",
    // X Server & Drivers
    "xorg-server",
    "xf86-video-fbdev",
    "libevdev",
    "mtdev",
    "xf86-input-evdev",
    "xkeyboard-config",
    "setxkbmap",
    "xinit",
    "xterm",
    "xprop",
    // User Utilities
    "bash",
    "coreutils",
    "tar",
    "gzip",
    "findutils",
    "diffutils",
    "patch",
    "which",
    "procps-ng",
    "nano",
    "grep",
    "sed",
    "gawk",
    "kbd",
    "grub",
    // Development Tools
    "binutils",
    "gcc",
    // GeminiOS Specifics
    "geminios_core",    // init, signals, user_mgmt
    "geminios_pkgs",    // ls, pwd, cat, etc.
    "geminios_complex", // gpkg, ping, installer, etc.
];

/// Packages built before the target environment exists. These get the clean
/// baseline environment only; everything after them also sources target_env.sh.
pub const BOOTSTRAP_PACKAGES: &[&str] = &["kernel_headers", "glibc"];

/// Whether a package is in the known build order.
pub fn is_known(name: &str) -> bool {
    PACKAGE_ORDER.contains(&name)
}

/// Whether a package builds without the target environment overlay.
pub fn is_bootstrap(name: &str) -> bool {
    BOOTSTRAP_PACKAGES.contains(&name)
}

/// Export metadata for a package that ships as a .gpkg archive.
#[derive(Debug, Clone, Copy)]
pub struct ExportMeta {
    pub version: &'static str,
    pub description: &'static str,
    pub depends: &'static [&'static str],
}

/// Default metadata for packages without a table entry.
pub const DEFAULT_EXPORT_META: ExportMeta = ExportMeta {
    version: "1.0",
    description: "",
    depends: &[],
};

/// Control metadata for the packages that export gpkg archives.
///
/// A package exports an archive when its port leaves an install tree at
/// `ports/<name>/root/`; packages absent from this table export with
/// [`DEFAULT_EXPORT_META`].
const EXPORT_METADATA: &[(&str, ExportMeta)] = &[
    (
        "geminios_core",
        ExportMeta {
            version: "1.0",
            description: "GeminiOS init, signal handling and user management",
            depends: &["glibc"],
        },
    ),
    (
        "geminios_pkgs",
        ExportMeta {
            version: "1.0",
            description: "GeminiOS core userland utilities",
            depends: &["glibc", "geminios_core"],
        },
    ),
    (
        "geminios_complex",
        ExportMeta {
            version: "1.0",
            description: "GeminiOS package manager, networking and installer tools",
            depends: &["glibc", "zstd", "geminios_core"],
        },
    ),
    (
        "snake",
        ExportMeta {
            version: "1.0",
            description: "Terminal snake game",
            depends: &["glibc", "ncurses"],
        },
    ),
];

/// Look up export metadata for a package.
pub fn export_meta(name: &str) -> ExportMeta {
    EXPORT_METADATA
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, m)| *m)
        .unwrap_or(DEFAULT_EXPORT_META)
}
