use std::path::Path;

/// Preserve file attributes (permissions, modification time) from src to dest.
/// Best-effort: errors are ignored since the file data is already written.
fn preserve_attributes(src: &Path, dest: &Path) {
    if let Ok(meta) = std::fs::metadata(src) {
        if let Ok(mtime) = meta.modified() {
            let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
        }
        // Windows permissions are handled by std::fs::copy
        #[cfg(unix)]
        {
            let _ = std::fs::set_permissions(dest, meta.permissions());
        }
    }
}

/// Copy a file or directory recursively, preserving attributes
pub fn copy_path(src: &Path, dest: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        copy_dir_recursive(src, dest)
    } else {
        std::fs::copy(src, dest)?;
        preserve_attributes(src, dest);
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            std::fs::copy(&src_path, &dest_path)?;
            preserve_attributes(&src_path, &dest_path);
        }
    }

    // Last, so mtime isn't changed by creating children
    preserve_attributes(src, dest);

    Ok(())
}

/// Delete a file or directory
pub fn delete_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Whether `path` is `ancestor` itself or somewhere below it
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    path.starts_with(ancestor)
}
